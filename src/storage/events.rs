//! Audit event storage and retrieval.
//!
//! Every mutation of `transactions_local` leaves a row in `sync_events`, so
//! it is always possible to reconstruct why a record ended up the way it is
//! (who wrote it, which side won a conflict, when it was purged).

use rusqlite::{Connection, Result};

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    // Local edits
    RecordCreated,
    RecordUpdated,
    RecordDeleted,

    // Push outcomes
    RecordSynced,
    TombstonePurged,
    SyncErrorFlagged,
    SyncErrorCleared,

    // Pull outcomes
    RemoteApplied,
    ConflictRemoteWon,
    ConflictLocalWon,

    RecordQuarantined,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RecordCreated => "record_created",
            Self::RecordUpdated => "record_updated",
            Self::RecordDeleted => "record_deleted",
            Self::RecordSynced => "record_synced",
            Self::TombstonePurged => "tombstone_purged",
            Self::SyncErrorFlagged => "sync_error_flagged",
            Self::SyncErrorCleared => "sync_error_cleared",
            Self::RemoteApplied => "remote_applied",
            Self::ConflictRemoteWon => "conflict_remote_won",
            Self::ConflictLocalWon => "conflict_local_won",
            Self::RecordQuarantined => "record_quarantined",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "record_created" => Self::RecordCreated,
            "record_updated" => Self::RecordUpdated,
            "record_deleted" => Self::RecordDeleted,
            "record_synced" => Self::RecordSynced,
            "tombstone_purged" => Self::TombstonePurged,
            "sync_error_flagged" => Self::SyncErrorFlagged,
            "sync_error_cleared" => Self::SyncErrorCleared,
            "remote_applied" => Self::RemoteApplied,
            "conflict_remote_won" => Self::ConflictRemoteWon,
            "conflict_local_won" => Self::ConflictLocalWon,
            "record_quarantined" => Self::RecordQuarantined,
            _ => return None,
        })
    }
}

/// An audit event record.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub tenant_id: String,
    pub record_id: String,
    pub event_type: EventType,
    pub actor: String,
    pub old_version: Option<i64>,
    pub new_version: Option<i64>,
    pub comment: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(tenant_id: &str, record_id: &str, event_type: EventType, actor: &str) -> Self {
        Self {
            id: 0,
            tenant_id: tenant_id.to_string(),
            record_id: record_id.to_string(),
            event_type,
            actor: actor.to_string(),
            old_version: None,
            new_version: None,
            comment: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add the version transition this event caused.
    #[must_use]
    pub fn with_versions(mut self, old: Option<i64>, new: Option<i64>) -> Self {
        self.old_version = old;
        self.new_version = new;
        self
    }

    /// Add a comment to the event.
    #[must_use]
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO sync_events (tenant_id, record_id, event_type, actor, old_version, new_version, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            event.tenant_id,
            event.record_id,
            event.event_type.as_str(),
            event.actor,
            event.old_version,
            event.new_version,
            event.comment,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get events for a record, newest first.
///
/// Rows with an event type this build does not know are skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_events(
    conn: &Connection,
    tenant_id: &str,
    record_id: &str,
    limit: Option<u32>,
) -> Result<Vec<Event>> {
    let limit = limit.unwrap_or(100);
    let mut stmt = conn.prepare(
        "SELECT id, tenant_id, record_id, event_type, actor, old_version, new_version, comment, created_at
         FROM sync_events
         WHERE tenant_id = ?1 AND record_id = ?2
         ORDER BY id DESC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(rusqlite::params![tenant_id, record_id, limit], |row| {
        let event_type: String = row.get(3)?;
        let Some(event_type) = EventType::parse(&event_type) else {
            return Ok(None);
        };
        Ok(Some(Event {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            record_id: row.get(2)?,
            event_type,
            actor: row.get(4)?,
            old_version: row.get(5)?,
            new_version: row.get(6)?,
            comment: row.get(7)?,
            created_at: row.get(8)?,
        }))
    })?;

    let mut events = Vec::new();
    for row in rows {
        if let Some(event) = row? {
            events.push(event);
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;

    #[test]
    fn test_event_insert_and_get() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let event = Event::new("tenant-a", "rec-1", EventType::RecordSynced, "sync")
            .with_versions(Some(1), Some(2))
            .with_comment("accepted");

        let id = insert_event(&conn, &event).unwrap();
        assert!(id > 0);

        let events = get_events(&conn, "tenant-a", "rec-1", Some(10)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::RecordSynced);
        assert_eq!(events[0].new_version, Some(2));
        assert_eq!(events[0].comment.as_deref(), Some("accepted"));

        assert!(get_events(&conn, "tenant-b", "rec-1", None).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_event_types_skipped() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO sync_events (tenant_id, record_id, event_type, actor, created_at)
             VALUES ('t', 'r', 'from_the_future', 'sync', 0)",
            [],
        )
        .unwrap();
        assert!(get_events(&conn, "t", "r", None).unwrap().is_empty());
    }
}
