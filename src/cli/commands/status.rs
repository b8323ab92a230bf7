//! Status command implementation.
//!
//! Reads only the local store; works offline.

use chrono::{TimeZone, Utc};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::cli::commands::Workspace;
use crate::error::{Error, Result};
use crate::sync::SyncState;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    tenant: Option<String>,
    pending_count: usize,
    error_count: usize,
    last_synced_at: Option<i64>,
    last_error: Option<String>,
    cursor: i64,
    state: SyncState,
    remote_url: Option<String>,
    flagged: Vec<FlaggedRecord>,
}

#[derive(Serialize)]
struct FlaggedRecord {
    id: String,
    reason: String,
}

/// Execute status command.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn execute(db: Option<&Path>, data_dir: Option<&Path>, json: bool) -> Result<()> {
    let ws = Workspace::locate(db, data_dir)?;
    let store = ws.open_store()?;

    let output = match ws.tenant() {
        Ok(tenant) => {
            let summary = store.sync_summary(&tenant)?;
            let flagged = store
                .list_sync_errors(&tenant)?
                .into_iter()
                .map(|(id, reason)| FlaggedRecord { id, reason })
                .collect();
            StatusOutput {
                tenant: Some(tenant.to_string()),
                pending_count: summary.pending_count,
                error_count: summary.error_count,
                last_synced_at: summary.last_synced_at,
                last_error: summary.last_error,
                cursor: summary.cursor,
                state: SyncState::Idle,
                remote_url: ws.config.remote_url(),
                flagged,
            }
        }
        Err(Error::NoTenantResolved) => StatusOutput {
            tenant: None,
            pending_count: 0,
            error_count: 0,
            last_synced_at: None,
            last_error: None,
            cursor: 0,
            state: SyncState::Faulted,
            remote_url: ws.config.remote_url(),
            flagged: Vec::new(),
        },
        Err(e) => return Err(e),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    print_human(&output);
    Ok(())
}

fn print_human(output: &StatusOutput) {
    let Some(tenant) = &output.tenant else {
        println!("{}", "Sync faulted: no company bound to this device".red().bold());
        println!("  Run `ledger-sync tenant set <company-id>`");
        return;
    };

    println!("{} {}", "Company:".bold(), tenant.cyan());
    match &output.remote_url {
        Some(url) => println!("{} {url}", "Remote:".bold()),
        None => println!("{} {}", "Remote:".bold(), "not configured".dimmed()),
    }
    println!();

    if output.pending_count == 0 {
        println!("{}", "All changes synced".green());
    } else {
        println!("{} {}", output.pending_count.to_string().yellow(), "change(s) waiting to sync");
    }

    match output.last_synced_at.and_then(|ms| Utc.timestamp_millis_opt(ms).single()) {
        Some(at) => println!("Last synced: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last synced: {}", "never".dimmed()),
    }

    if let Some(error) = &output.last_error {
        println!("{} {error}", "Last error:".red());
    }

    if !output.flagged.is_empty() {
        println!();
        println!("{}", "Rejected by the remote (fix, then `ledger-sync retry`):".yellow());
        for f in &output.flagged {
            println!("  {}  {}", f.id.cyan(), f.reason);
        }
    }
}
