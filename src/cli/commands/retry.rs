//! Retry command implementation.

use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::cli::commands::Workspace;
use crate::error::Result;

#[derive(Serialize)]
struct RetryOutput {
    requeued: usize,
}

/// Clear the sync error on one flagged transaction, or on all of them, so
/// the next sync pushes them again.
///
/// # Errors
///
/// `NotFound` for an unknown id.
pub fn execute(id: Option<&str>, db: Option<&Path>, data_dir: Option<&Path>, json: bool) -> Result<()> {
    let ws = Workspace::locate(db, data_dir)?;
    let mut store = ws.open_store()?;
    let tenant = ws.tenant()?;

    let requeued = store.clear_sync_errors(&tenant, id)?;

    if json {
        println!("{}", serde_json::to_string(&RetryOutput { requeued })?);
    } else if requeued == 0 {
        println!("Nothing to retry.");
    } else {
        println!("{} {requeued} transaction(s) for the next sync", "Queued".green());
    }
    Ok(())
}
