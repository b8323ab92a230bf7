//! Sync command implementation.
//!
//! Runs exactly one manual cycle against the configured remote store and
//! prints what it did. A manual trigger overrides any backoff window.

use colored::Colorize;
use std::path::Path;

use crate::cli::commands::{runtime, Workspace};
use crate::error::{Error, Result};
use crate::sync::{SkipReason, SyncErrorEvent, SyncErrorKind, SyncReport, Trigger};

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error when the cycle could not run or stopped early.
pub fn execute(db: Option<&Path>, data_dir: Option<&Path>, json: bool) -> Result<()> {
    let ws = Workspace::locate(db, data_dir)?;
    let engine = ws.engine()?;
    let report = runtime()?.block_on(engine.run_cycle(Trigger::Manual));

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print_report(&report);
    }

    match failure(&report) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Human-readable summary of one cycle.
pub(crate) fn print_report(report: &SyncReport) {
    if let Some(reason) = &report.skipped {
        let why = match reason {
            SkipReason::AlreadyRunning => "a sync is already running".to_string(),
            SkipReason::Backoff { retry_in_ms } => {
                format!("backing off, next attempt in {}s", retry_in_ms.div_ceil(1000))
            }
            SkipReason::Offline => "offline".to_string(),
            SkipReason::Faulted => "no company bound to this device".to_string(),
        };
        println!("{} {why}", "Sync skipped:".yellow());
        return;
    }

    let headline = if report.interrupted {
        "Sync stopped early".yellow().bold()
    } else {
        "Sync complete".green().bold()
    };
    println!(
        "{headline}: {} pushed, {} pulled, {} conflict(s)",
        report.pushed, report.pulled, report.conflicts
    );

    for event in &report.errors {
        let target = event.id.as_deref().unwrap_or("-");
        println!("  {} {}: {}", "!".red(), target.cyan(), event.message);
    }
}

/// The error that stopped a cycle, if one did.
///
/// Per-record rejections do not fail the command; the rows stay flagged.
fn failure(report: &SyncReport) -> Option<Error> {
    if report.skipped == Some(SkipReason::Faulted) {
        return Some(Error::NoTenantResolved);
    }
    if !report.interrupted {
        return None;
    }
    let event = report
        .errors
        .iter()
        .find(|e| e.kind != SyncErrorKind::Validation)
        .or_else(|| report.errors.first())?;
    Some(to_error(event))
}

fn to_error(event: &SyncErrorEvent) -> Error {
    match event.kind {
        SyncErrorKind::Transient => Error::TransientNetwork(event.message.clone()),
        SyncErrorKind::Auth => Error::Unauthorized(event.message.clone()),
        SyncErrorKind::NoTenant => Error::NoTenantResolved,
        SyncErrorKind::Cancelled => Error::Cancelled,
        SyncErrorKind::TenantMismatch => Error::TenantMismatch {
            id: event.id.clone().unwrap_or_default(),
        },
        SyncErrorKind::Validation
        | SyncErrorKind::Conflict
        | SyncErrorKind::Corruption
        | SyncErrorKind::Storage => Error::Other(event.message.clone()),
    }
}
