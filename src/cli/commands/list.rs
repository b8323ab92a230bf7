//! List command implementation.

use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::cli::commands::Workspace;
use crate::error::Result;
use crate::model::{LocalRecord, RecordKind};
use crate::validate::format_amount;

#[derive(Serialize)]
struct ListOutput<'a> {
    tenant: String,
    count: usize,
    records: &'a [LocalRecord],
}

/// Execute the list command.
///
/// # Errors
///
/// Returns an error if the device is unbound or the store cannot be read.
pub fn execute(
    all: bool,
    pending: bool,
    limit: Option<usize>,
    db: Option<&Path>,
    data_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    let ws = Workspace::locate(db, data_dir)?;
    let store = ws.open_store()?;
    let tenant = ws.tenant()?;

    let records = filter(store.list(&tenant, all)?, pending, limit);

    if json {
        let output = ListOutput {
            tenant: tenant.to_string(),
            count: records.len(),
            records: &records,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No transactions.");
        return Ok(());
    }

    for local in &records {
        let r = &local.record;
        let amount = match r.kind {
            RecordKind::Income => format!("+{}", format_amount(r.amount_minor_units)).green(),
            RecordKind::Expense => format!("-{}", format_amount(r.amount_minor_units)).red(),
        };
        let marker = if local.sync_error.is_some() {
            "!".yellow().bold()
        } else if r.deleted {
            "x".red()
        } else if local.dirty {
            "*".yellow()
        } else {
            " ".normal()
        };
        println!(
            "{marker} {}  {:>12}  {}  {}",
            r.date,
            amount,
            short_id(&r.id).dimmed(),
            r.description
        );
        if let Some(reason) = &local.sync_error {
            println!("    {}", reason.yellow());
        }
    }

    let dirty = records.iter().filter(|r| r.dirty).count();
    println!();
    println!("{} transaction(s), {} pending sync", records.len(), dirty);
    Ok(())
}

fn filter(records: Vec<LocalRecord>, pending: bool, limit: Option<usize>) -> Vec<LocalRecord> {
    records
        .into_iter()
        .filter(|r| !pending || r.dirty)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
