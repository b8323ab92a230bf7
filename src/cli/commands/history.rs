//! History command implementation.

use chrono::{TimeZone, Utc};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::cli::commands::{not_found, Workspace};
use crate::error::Result;
use crate::storage::Event;

#[derive(Serialize)]
struct EventLine<'a> {
    event: &'a str,
    actor: &'a str,
    old_version: Option<i64>,
    new_version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
    created_at: i64,
}

impl<'a> From<&'a Event> for EventLine<'a> {
    fn from(e: &'a Event) -> Self {
        Self {
            event: e.event_type.as_str(),
            actor: &e.actor,
            old_version: e.old_version,
            new_version: e.new_version,
            comment: e.comment.as_deref(),
            created_at: e.created_at,
        }
    }
}

/// Print the audit trail of one transaction, newest first.
///
/// # Errors
///
/// `NotFound` when neither the row nor any event for it exists.
pub fn execute(id: &str, limit: u32, db: Option<&Path>, data_dir: Option<&Path>, json: bool) -> Result<()> {
    let ws = Workspace::locate(db, data_dir)?;
    let store = ws.open_store()?;
    let tenant = ws.tenant()?;

    let events = store.events(&tenant, id, Some(limit))?;
    // Purged tombstones keep their history, so only fail when both are gone
    if events.is_empty() && store.get(&tenant, id)?.is_none() {
        return Err(not_found(&store, &tenant, id));
    }

    if json {
        let lines: Vec<EventLine<'_>> = events.iter().map(EventLine::from).collect();
        println!("{}", serde_json::to_string(&lines)?);
        return Ok(());
    }

    for e in &events {
        let at = Utc
            .timestamp_millis_opt(e.created_at)
            .single()
            .map_or_else(|| e.created_at.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        let versions = match (e.old_version, e.new_version) {
            (Some(old), Some(new)) if old != new => format!("v{old} → v{new}"),
            (_, Some(new)) => format!("v{new}"),
            _ => String::new(),
        };
        println!(
            "{}  {:<20} {:<8} {}",
            at.dimmed(),
            e.event_type.as_str().cyan(),
            versions,
            e.actor.dimmed()
        );
        if let Some(comment) = &e.comment {
            println!("    {comment}");
        }
    }
    Ok(())
}
