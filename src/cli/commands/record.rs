//! Record command implementation.

use colored::Colorize;
use std::path::Path;

use crate::cli::commands::{not_found, Workspace};
use crate::cli::RecordArgs;
use crate::error::Result;
use crate::model::{LocalRecord, NewTransaction};
use crate::validate::{format_amount, parse_amount, parse_date, parse_kind, validate_description};

/// Execute the record command.
///
/// # Errors
///
/// Returns an error for invalid input, an unbound device or a store failure.
pub fn execute(args: &RecordArgs, db: Option<&Path>, data_dir: Option<&Path>, json: bool) -> Result<()> {
    let ws = Workspace::locate(db, data_dir)?;
    let stored = record(&ws, args)?;

    if json {
        println!("{}", serde_json::to_string(&stored)?);
        return Ok(());
    }

    let r = &stored.record;
    let verb = if r.version > 1 { "Updated" } else { "Recorded" };
    println!(
        "{} {} {} on {}",
        verb.green(),
        r.kind,
        format_amount(r.amount_minor_units).bold(),
        r.date
    );
    println!("  ID: {}", r.id.cyan());
    if !r.description.is_empty() {
        println!("  {}", r.description);
    }
    println!("  {}", "Pending sync".dimmed());
    Ok(())
}

fn record(ws: &Workspace, args: &RecordArgs) -> Result<LocalRecord> {
    let kind = parse_kind(&args.kind)?;
    let amount = parse_amount(&args.amount)?;
    let date = parse_date(&args.date, chrono::Local::now().date_naive())?;
    let description = validate_description(&args.description.join(" "))?;

    let mut store = ws.open_store()?;
    let tenant = ws.tenant()?;

    if let Some(id) = &args.id {
        if store.get(&tenant, id)?.is_none() {
            return Err(not_found(&store, &tenant, id));
        }
    }

    let fields = NewTransaction {
        id: args.id.clone(),
        kind,
        date,
        amount_minor_units: amount,
        description,
    };
    store.upsert_local(&fields.into_record(tenant))
}
