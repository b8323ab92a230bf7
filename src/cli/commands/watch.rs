//! Watch command implementation.
//!
//! Keeps a scheduler running in the foreground: one cycle at start, then
//! one per interval, until Ctrl-C.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::cli::commands::sync::print_report;
use crate::cli::commands::{runtime, Workspace};
use crate::error::{Error, Result};
use crate::sync::scheduler::{self, LifecycleEvent};
use crate::sync::SyncReport;

#[derive(Serialize)]
struct WatchLine<'a> {
    at: String,
    #[serde(flatten)]
    report: &'a SyncReport,
}

/// Execute the watch command.
///
/// # Errors
///
/// Returns an error if the engine cannot be built or the interval is zero.
pub fn execute(
    interval: Option<u64>,
    db: Option<&Path>,
    data_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mut ws = Workspace::locate(db, data_dir)?;
    if let Some(secs) = interval {
        ws.config.interval_secs = Some(secs);
    }
    let engine = Arc::new(ws.engine()?);

    runtime()?.block_on(async move {
        let mut handle = scheduler::spawn(engine, true);
        handle.notify(LifecycleEvent::Manual)?;

        loop {
            tokio::select! {
                report = handle.next_report() => {
                    let Some(report) = report else { break };
                    emit(&report, json)?;
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.map_err(|e| Error::Other(format!("Failed to listen for Ctrl-C: {e}")))?;
                    info!("Interrupted, stopping sync");
                    break;
                }
            }
        }

        handle.shutdown().await;
        Ok(())
    })
}

fn emit(report: &SyncReport, json: bool) -> Result<()> {
    let at = chrono::Local::now().format("%H:%M:%S").to_string();
    if json {
        println!("{}", serde_json::to_string(&WatchLine { at, report })?);
    } else {
        print!("[{at}] ");
        print_report(report);
    }
    Ok(())
}
