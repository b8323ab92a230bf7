//! Delete command implementation.

use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::cli::commands::{not_found, Workspace};
use crate::error::{Error, Result};

#[derive(Serialize)]
struct DeleteOutput<'a> {
    id: &'a str,
    deleted: bool,
    version: i64,
}

/// Tombstone a transaction. The remote copy goes away on the next sync.
///
/// # Errors
///
/// `NotFound` if the current company has no such transaction.
pub fn execute(id: &str, db: Option<&Path>, data_dir: Option<&Path>, json: bool) -> Result<()> {
    let ws = Workspace::locate(db, data_dir)?;
    let mut store = ws.open_store()?;
    let tenant = ws.tenant()?;

    let deleted = match store.delete_local(&tenant, id) {
        Ok(row) => row,
        Err(Error::NotFound { .. }) => return Err(not_found(&store, &tenant, id)),
        Err(e) => return Err(e),
    };

    if json {
        let output = DeleteOutput {
            id,
            deleted: deleted.record.deleted,
            version: deleted.record.version,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{} {}", "Deleted".red(), id.cyan());
        println!("  {}", "Removal is pushed on the next sync".dimmed());
    }
    Ok(())
}
