//! SQLite storage implementation.
//!
//! `LocalStore` is the on-device mirror of a tenant's ledger. It knows
//! nothing about the network: the reconcilers call into it with the
//! outcomes they observed. Every mutation goes through [`LocalStore::mutate`],
//! which runs inside an IMMEDIATE transaction and writes the audit trail
//! before committing.

use crate::error::{Error, Result};
use crate::model::{LedgerRecord, LocalRecord, RecordKind, RemoteRecord, TenantId};
use crate::storage::events::{get_events, insert_event, Event, EventType};
use crate::storage::schema::apply_schema;
use crate::sync::conflict::{resolve, Resolution};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Actor recorded for edits made by the person using the app.
pub const ACTOR_USER: &str = "user";

/// Actor recorded for writes made by the reconcilers.
pub const ACTOR_SYNC: &str = "sync";

const RECORD_COLUMNS: &str = "id, tenant_id, kind, date, amount_minor_units, description, \
     version, base_version, dirty, deleted, sync_error, schema_version, created_at, updated_at";

/// SQLite-backed local mirror.
#[derive(Debug)]
pub struct LocalStore {
    conn: Connection,
}

/// Context for a mutation operation, collecting audit events.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Who caused the write (`user` or `sync`).
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event with the version transition it caused.
    pub fn record_change(
        &mut self,
        tenant: &TenantId,
        record_id: &str,
        event_type: EventType,
        old_version: Option<i64>,
        new_version: Option<i64>,
    ) {
        self.events.push(
            Event::new(tenant.as_str(), record_id, event_type, &self.actor)
                .with_versions(old_version, new_version),
        );
    }

    /// Record an event carrying a free-text explanation.
    pub fn record_comment(
        &mut self,
        tenant: &TenantId,
        record_id: &str,
        event_type: EventType,
        comment: &str,
    ) {
        self.events.push(
            Event::new(tenant.as_str(), record_id, event_type, &self.actor).with_comment(comment),
        );
    }
}

/// What `apply_remote` did with an incoming row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Row was absent locally and has been inserted clean.
    Inserted,
    /// Clean local row replaced by a newer remote version.
    Updated,
    /// Newer remote tombstone removed the local row.
    Removed,
    /// Remote version not newer than the clean local row.
    Stale,
    /// Tombstone for a row this device never had.
    TombstoneIgnored,
    /// Dirty local row lost to a higher remote version.
    RemoteWon,
    /// Dirty local row kept; it will be pushed.
    LocalWon,
    /// Row belongs to another tenant and was not touched.
    ForeignTenant,
}

impl ApplyOutcome {
    /// Whether the incoming row collided with an unsynced local edit.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::RemoteWon | Self::LocalWon)
    }

    /// Whether the local mirror changed.
    #[must_use]
    pub const fn changed_local(&self) -> bool {
        matches!(
            self,
            Self::Inserted | Self::Updated | Self::Removed | Self::RemoteWon
        )
    }
}

/// Result of acknowledging a pushed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncedOutcome {
    /// Row is clean at the accepted version.
    Cleared,
    /// Acknowledged tombstone was physically removed.
    Purged,
    /// Row was edited after it was sent; it stays dirty at `version`.
    StillDirty { version: i64 },
}

/// A dirty row that could not be decoded and was set aside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantinedRow {
    pub id: String,
    pub reason: String,
}

/// Snapshot of one tenant's push queue.
#[derive(Debug, Default)]
pub struct DirtyBatch {
    /// Decodable dirty rows, oldest first.
    pub records: Vec<LocalRecord>,
    /// Rows quarantined during this read.
    pub quarantined: Vec<QuarantinedRow>,
}

/// Result of merging one pulled page.
#[derive(Debug, Default)]
pub struct AppliedBatch {
    pub outcomes: Vec<(String, ApplyOutcome)>,
    /// Cursor after the page was applied.
    pub cursor: i64,
}

/// Per-tenant sync counters for the status surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub pending_count: usize,
    pub error_count: usize,
    pub last_synced_at: Option<i64>,
    pub cursor: i64,
    pub last_error: Option<String>,
}

/// Bookkeeping columns of a row, readable even when its content is damaged.
#[derive(Debug)]
struct RowState {
    tenant_id: String,
    version: i64,
    dirty: bool,
    deleted: bool,
}

impl LocalStore {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5_000)))?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// Begins an IMMEDIATE transaction, runs the closure, writes the audit
    /// events it collected and commits. Any error rolls the whole thing back.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        Ok(result)
    }

    // ==================
    // Local Edits
    // ==================

    /// Insert or edit a record on behalf of the user.
    ///
    /// The row becomes dirty with `version = previous + 1` (1 for a new
    /// row) and any sync error flag is cleared. A tombstoned row is revived.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty id, `TenantMismatch` if the id already
    /// belongs to another tenant.
    pub fn upsert_local(&mut self, record: &LedgerRecord) -> Result<LocalRecord> {
        if record.id.trim().is_empty() {
            return Err(Error::InvalidArgument("record id must not be empty".into()));
        }
        let tenant = &record.tenant_id;
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("upsert_local", ACTOR_USER, |tx, ctx| {
            let existing = row_state(tx, &record.id)?;
            if let Some(state) = &existing {
                if state.tenant_id != tenant.as_str() {
                    return Err(Error::TenantMismatch {
                        id: record.id.clone(),
                    });
                }
            }

            let old_version = existing.as_ref().map(|s| s.version);
            let version = old_version.unwrap_or(0).max(0) + 1;

            tx.execute(
                "INSERT INTO transactions_local (id, tenant_id, kind, date, amount_minor_units, description,
                     version, base_version, dirty, deleted, sync_error, schema_version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 1, 0, NULL, ?8, ?9, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                     kind = excluded.kind,
                     date = excluded.date,
                     amount_minor_units = excluded.amount_minor_units,
                     description = excluded.description,
                     version = excluded.version,
                     dirty = 1,
                     deleted = 0,
                     sync_error = NULL,
                     schema_version = excluded.schema_version,
                     updated_at = excluded.updated_at",
                rusqlite::params![
                    record.id,
                    tenant.as_str(),
                    record.kind.as_str(),
                    record.date.to_string(),
                    record.amount_minor_units,
                    record.description,
                    version,
                    record.schema_version,
                    now,
                ],
            )?;

            let event_type = if existing.is_some() {
                EventType::RecordUpdated
            } else {
                EventType::RecordCreated
            };
            ctx.record_change(tenant, &record.id, event_type, old_version, Some(version));
            Ok(())
        })?;

        debug!(tenant = %tenant, id = %record.id, "Local record written");
        self.get(tenant, &record.id)?.ok_or_else(|| Error::NotFound {
            id: record.id.clone(),
        })
    }

    /// Tombstone a record. The row is removed once the remote acknowledges.
    ///
    /// Deleting an already-deleted row is a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` if the tenant has no such row.
    pub fn delete_local(&mut self, tenant: &TenantId, id: &str) -> Result<LocalRecord> {
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("delete_local", ACTOR_USER, |tx, ctx| {
            let state = scoped_state(tx, tenant, id)?;
            if state.deleted {
                return Ok(());
            }
            let version = state.version + 1;
            tx.execute(
                "UPDATE transactions_local
                 SET deleted = 1, dirty = 1, version = ?1, sync_error = NULL, updated_at = ?2
                 WHERE id = ?3",
                rusqlite::params![version, now, id],
            )?;
            ctx.record_change(tenant, id, EventType::RecordDeleted, Some(state.version), Some(version));
            Ok(())
        })?;

        self.get(tenant, id)?
            .ok_or_else(|| Error::NotFound { id: id.to_string() })
    }

    // ==================
    // Push Side
    // ==================

    /// Snapshot the tenant's push queue.
    ///
    /// Rows flagged with a sync error are excluded. Rows that fail to
    /// decode are quarantined (flagged) and reported instead of failing the
    /// read.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or the quarantine write fails.
    pub fn list_dirty(&mut self, tenant: &TenantId) -> Result<DirtyBatch> {
        let rows = {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM transactions_local
                 WHERE tenant_id = ?1 AND dirty = 1 AND sync_error IS NULL
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map([tenant.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, decode_record(row)))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut batch = DirtyBatch::default();
        for (id, decoded) in rows {
            match decoded {
                Ok(record) => batch.records.push(record),
                Err(reason) => batch.quarantined.push(QuarantinedRow { id, reason }),
            }
        }

        if !batch.quarantined.is_empty() {
            self.quarantine(tenant, &batch.quarantined)?;
        }
        Ok(batch)
    }

    fn quarantine(&mut self, tenant: &TenantId, rows: &[QuarantinedRow]) -> Result<()> {
        self.mutate("quarantine", ACTOR_SYNC, |tx, ctx| {
            for row in rows {
                warn!(tenant = %tenant, id = %row.id, reason = %row.reason, "Quarantining corrupt local row");
                tx.execute(
                    "UPDATE transactions_local SET sync_error = ?1 WHERE id = ?2 AND tenant_id = ?3",
                    rusqlite::params![
                        format!("quarantined: {}", row.reason),
                        row.id,
                        tenant.as_str()
                    ],
                )?;
                ctx.record_comment(tenant, &row.id, EventType::RecordQuarantined, &row.reason);
            }
            Ok(())
        })
    }

    /// Acknowledge that the remote accepted a pushed row.
    ///
    /// `sent_version` is the version the push carried. If the row has been
    /// edited since, only `base_version` advances and the row stays dirty
    /// with a version above the accepted one. An acknowledged tombstone is
    /// physically removed.
    ///
    /// # Errors
    ///
    /// `NotFound` if the tenant has no such row.
    pub fn mark_synced(
        &mut self,
        tenant: &TenantId,
        id: &str,
        accepted_version: i64,
        sent_version: Option<i64>,
    ) -> Result<SyncedOutcome> {
        self.mutate("mark_synced", ACTOR_SYNC, |tx, ctx| {
            let state = scoped_state(tx, tenant, id)?;

            if sent_version.is_some_and(|sent| sent != state.version) {
                let version = state.version.max(accepted_version + 1);
                tx.execute(
                    "UPDATE transactions_local SET base_version = ?1, version = ?2 WHERE id = ?3",
                    rusqlite::params![accepted_version, version, id],
                )?;
                ctx.events.push(
                    Event::new(tenant.as_str(), id, EventType::RecordSynced, &ctx.actor)
                        .with_versions(Some(state.version), Some(version))
                        .with_comment("edited while in flight; still dirty"),
                );
                return Ok(SyncedOutcome::StillDirty { version });
            }

            if state.deleted {
                tx.execute("DELETE FROM transactions_local WHERE id = ?1", [id])?;
                ctx.record_change(tenant, id, EventType::TombstonePurged, Some(state.version), None);
                return Ok(SyncedOutcome::Purged);
            }

            tx.execute(
                "UPDATE transactions_local
                 SET dirty = 0, version = ?1, base_version = ?1, sync_error = NULL
                 WHERE id = ?2",
                rusqlite::params![accepted_version, id],
            )?;
            ctx.record_change(
                tenant,
                id,
                EventType::RecordSynced,
                Some(state.version),
                Some(accepted_version),
            );
            Ok(SyncedOutcome::Cleared)
        })
    }

    /// Re-base a dirty row after it won a push conflict.
    ///
    /// The next push carries `base_version = server_version` and a version
    /// strictly above it, so the remote's version check accepts it.
    ///
    /// # Errors
    ///
    /// `NotFound` if the tenant has no such row.
    pub fn rebase_local(&mut self, tenant: &TenantId, id: &str, server_version: i64) -> Result<i64> {
        self.mutate("rebase_local", ACTOR_SYNC, |tx, ctx| {
            let state = scoped_state(tx, tenant, id)?;
            let version = state.version.max(server_version) + 1;
            tx.execute(
                "UPDATE transactions_local SET base_version = ?1, version = ?2, dirty = 1 WHERE id = ?3",
                rusqlite::params![server_version, version, id],
            )?;
            ctx.record_change(tenant, id, EventType::ConflictLocalWon, Some(state.version), Some(version));
            Ok(version)
        })
    }

    /// Flag a row the remote rejected. It is skipped by automatic pushes
    /// until the user edits it or clears the flag.
    ///
    /// # Errors
    ///
    /// `NotFound` if the tenant has no such row.
    pub fn mark_sync_error(&mut self, tenant: &TenantId, id: &str, reason: &str) -> Result<()> {
        self.mutate("mark_sync_error", ACTOR_SYNC, |tx, ctx| {
            scoped_state(tx, tenant, id)?;
            tx.execute(
                "UPDATE transactions_local SET sync_error = ?1 WHERE id = ?2",
                rusqlite::params![reason, id],
            )?;
            ctx.record_comment(tenant, id, EventType::SyncErrorFlagged, reason);
            Ok(())
        })
    }

    /// Clear sync error flags so the rows are pushed again.
    ///
    /// With `id = None` every flagged row of the tenant is cleared. Returns
    /// the number of rows cleared.
    ///
    /// # Errors
    ///
    /// `NotFound` if a specific id was given and the tenant has no such row.
    pub fn clear_sync_errors(&mut self, tenant: &TenantId, id: Option<&str>) -> Result<usize> {
        self.mutate("clear_sync_errors", ACTOR_USER, |tx, ctx| {
            let ids: Vec<String> = if let Some(id) = id {
                scoped_state(tx, tenant, id)?;
                let flagged: bool = tx.query_row(
                    "SELECT sync_error IS NOT NULL FROM transactions_local WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )?;
                if flagged { vec![id.to_string()] } else { Vec::new() }
            } else {
                let mut stmt = tx.prepare(
                    "SELECT id FROM transactions_local WHERE tenant_id = ?1 AND sync_error IS NOT NULL",
                )?;
                let rows = stmt.query_map([tenant.as_str()], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            for id in &ids {
                tx.execute(
                    "UPDATE transactions_local SET sync_error = NULL WHERE id = ?1",
                    [id],
                )?;
                ctx.record_change(tenant, id, EventType::SyncErrorCleared, None, None);
            }
            Ok(ids.len())
        })
    }

    // ==================
    // Pull Side
    // ==================

    /// Merge one record from the remote store.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn apply_remote(&mut self, tenant: &TenantId, remote: &RemoteRecord) -> Result<ApplyOutcome> {
        self.mutate("apply_remote", ACTOR_SYNC, |tx, ctx| {
            apply_remote_in(tx, ctx, tenant, &remote.record)
        })
    }

    /// Merge a pulled page and advance the cursor in one transaction.
    ///
    /// Either the whole page and the new watermark become durable, or
    /// neither does.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is committed then.
    pub fn apply_remote_batch(
        &mut self,
        tenant: &TenantId,
        records: &[RemoteRecord],
        watermark: i64,
    ) -> Result<AppliedBatch> {
        self.mutate("apply_remote_batch", ACTOR_SYNC, |tx, ctx| {
            let mut outcomes = Vec::with_capacity(records.len());
            for remote in records {
                let outcome = apply_remote_in(tx, ctx, tenant, &remote.record)?;
                outcomes.push((remote.record.id.clone(), outcome));
            }
            let cursor = advance_cursor_in(tx, tenant, watermark)?;
            Ok(AppliedBatch { outcomes, cursor })
        })
    }

    /// Current pull watermark for a tenant (0 before the first pull).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn cursor(&self, tenant: &TenantId) -> Result<i64> {
        let cursor = self
            .conn
            .query_row(
                "SELECT cursor FROM sync_state WHERE tenant_id = ?1",
                [tenant.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(cursor.unwrap_or(0))
    }

    /// Move the watermark forward. Older values are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn advance_cursor(&mut self, tenant: &TenantId, watermark: i64) -> Result<i64> {
        let tx = self.conn.transaction()?;
        let cursor = advance_cursor_in(&tx, tenant, watermark)?;
        tx.commit()?;
        Ok(cursor)
    }

    /// Record that a full cycle finished for the tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn record_cycle_success(&mut self, tenant: &TenantId, at: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_state (tenant_id, cursor, last_synced_at, last_error, updated_at)
             VALUES (?1, 0, ?2, NULL, ?2)
             ON CONFLICT(tenant_id) DO UPDATE SET
                 last_synced_at = excluded.last_synced_at,
                 last_error = NULL,
                 updated_at = excluded.updated_at",
            rusqlite::params![tenant.as_str(), at],
        )?;
        Ok(())
    }

    /// Record why the last cycle for the tenant did not finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn record_cycle_failure(&mut self, tenant: &TenantId, message: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_state (tenant_id, cursor, last_error, updated_at)
             VALUES (?1, 0, ?2, ?3)
             ON CONFLICT(tenant_id) DO UPDATE SET
                 last_error = excluded.last_error,
                 updated_at = excluded.updated_at",
            rusqlite::params![tenant.as_str(), message, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    // ==================
    // Reads
    // ==================

    /// Get one of the tenant's records, tombstones included.
    ///
    /// # Errors
    ///
    /// `LocalStoreCorruption` if the row exists but cannot be decoded.
    pub fn get(&self, tenant: &TenantId, id: &str) -> Result<Option<LocalRecord>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM transactions_local WHERE id = ?1 AND tenant_id = ?2"
                ),
                rusqlite::params![id, tenant.as_str()],
                |row| Ok(decode_record(row)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(reason)) => Err(Error::LocalStoreCorruption {
                id: id.to_string(),
                reason,
            }),
        }
    }

    /// List the tenant's records, newest transaction date first.
    ///
    /// Rows that cannot be decoded are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self, tenant: &TenantId, include_deleted: bool) -> Result<Vec<LocalRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM transactions_local
             WHERE tenant_id = ?1 AND (?2 OR deleted = 0)
             ORDER BY date DESC, created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(rusqlite::params![tenant.as_str(), include_deleted], |row| {
            Ok((row.get::<_, String>(0)?, decode_record(row)))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, decoded) = row?;
            match decoded {
                Ok(record) => records.push(record),
                Err(reason) => warn!(tenant = %tenant, id = %id, reason = %reason, "Skipping unreadable row"),
            }
        }
        Ok(records)
    }

    /// Rows currently excluded from automatic pushes, with the reason.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_sync_errors(&self, tenant: &TenantId) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, sync_error FROM transactions_local
             WHERE tenant_id = ?1 AND sync_error IS NOT NULL
             ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([tenant.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Counters for the status surface.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn sync_summary(&self, tenant: &TenantId) -> Result<SyncSummary> {
        let (pending, errors): (i64, i64) = self.conn.query_row(
            "SELECT
                 COALESCE(SUM(CASE WHEN dirty = 1 AND sync_error IS NULL THEN 1 ELSE 0 END), 0),
                 COALESCE(SUM(CASE WHEN sync_error IS NOT NULL THEN 1 ELSE 0 END), 0)
             FROM transactions_local WHERE tenant_id = ?1",
            [tenant.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let state = self
            .conn
            .query_row(
                "SELECT cursor, last_synced_at, last_error FROM sync_state WHERE tenant_id = ?1",
                [tenant.as_str()],
                |row| Ok((row.get::<_, i64>(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (cursor, last_synced_at, last_error) = state.unwrap_or((0, None, None));

        Ok(SyncSummary {
            pending_count: usize::try_from(pending).unwrap_or(0),
            error_count: usize::try_from(errors).unwrap_or(0),
            last_synced_at,
            cursor,
            last_error,
        })
    }

    /// Audit trail for one record, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn events(&self, tenant: &TenantId, id: &str, limit: Option<u32>) -> Result<Vec<Event>> {
        Ok(get_events(&self.conn, tenant.as_str(), id, limit)?)
    }
}

// ==================
// Row helpers
// ==================

fn row_state(conn: &Connection, id: &str) -> Result<Option<RowState>> {
    Ok(conn
        .query_row(
            "SELECT tenant_id, version, dirty, deleted FROM transactions_local WHERE id = ?1",
            [id],
            |row| {
                Ok(RowState {
                    tenant_id: row.get(0)?,
                    version: row.get(1)?,
                    dirty: row.get(2)?,
                    deleted: row.get(3)?,
                })
            },
        )
        .optional()?)
}

/// Row state for an id that must belong to `tenant`.
fn scoped_state(conn: &Connection, tenant: &TenantId, id: &str) -> Result<RowState> {
    match row_state(conn, id)? {
        Some(state) if state.tenant_id == tenant.as_str() => Ok(state),
        _ => Err(Error::NotFound { id: id.to_string() }),
    }
}

fn decode_record(row: &Row<'_>) -> std::result::Result<LocalRecord, String> {
    let column = |e: rusqlite::Error| e.to_string();

    let tenant_raw: String = row.get(1).map_err(column)?;
    let tenant_id =
        TenantId::parse(&tenant_raw).ok_or_else(|| format!("malformed tenant id '{tenant_raw}'"))?;

    let kind_raw: String = row.get(2).map_err(column)?;
    let kind = kind_raw.parse::<RecordKind>()?;

    let date_raw: String = row.get(3).map_err(column)?;
    let date = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d")
        .map_err(|e| format!("bad date '{date_raw}': {e}"))?;

    let amount_minor_units: i64 = row
        .get(4)
        .map_err(|_| "amount is not an integer".to_string())?;

    Ok(LocalRecord {
        record: LedgerRecord {
            id: row.get(0).map_err(column)?,
            tenant_id,
            kind,
            date,
            amount_minor_units,
            description: row.get(5).map_err(column)?,
            version: row.get(6).map_err(column)?,
            deleted: row.get(9).map_err(column)?,
            schema_version: row.get(11).map_err(column)?,
        },
        base_version: row.get(7).map_err(column)?,
        dirty: row.get(8).map_err(column)?,
        sync_error: row.get(10).map_err(column)?,
        created_at: row.get(12).map_err(column)?,
        updated_at: row.get(13).map_err(column)?,
    })
}

fn advance_cursor_in(conn: &Connection, tenant: &TenantId, watermark: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO sync_state (tenant_id, cursor, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(tenant_id) DO UPDATE SET
             cursor = MAX(cursor, excluded.cursor),
             updated_at = excluded.updated_at",
        rusqlite::params![tenant.as_str(), watermark, chrono::Utc::now().timestamp_millis()],
    )?;
    Ok(conn.query_row(
        "SELECT cursor FROM sync_state WHERE tenant_id = ?1",
        [tenant.as_str()],
        |row| row.get(0),
    )?)
}

/// Write a remote row as the clean local copy.
fn write_clean(conn: &Connection, incoming: &LedgerRecord) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO transactions_local (id, tenant_id, kind, date, amount_minor_units, description,
             version, base_version, dirty, deleted, sync_error, schema_version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, 0, 0, NULL, ?8, ?9, ?9)
         ON CONFLICT(id) DO UPDATE SET
             kind = excluded.kind,
             date = excluded.date,
             amount_minor_units = excluded.amount_minor_units,
             description = excluded.description,
             version = excluded.version,
             base_version = excluded.base_version,
             dirty = 0,
             deleted = 0,
             sync_error = NULL,
             schema_version = excluded.schema_version,
             updated_at = excluded.updated_at",
        rusqlite::params![
            incoming.id,
            incoming.tenant_id.as_str(),
            incoming.kind.as_str(),
            incoming.date.to_string(),
            incoming.amount_minor_units,
            incoming.description,
            incoming.version,
            incoming.schema_version,
            now,
        ],
    )?;
    Ok(())
}

/// Replace the local row with the remote one, or drop it for a tombstone.
fn take_remote(conn: &Connection, incoming: &LedgerRecord) -> Result<()> {
    if incoming.deleted {
        conn.execute("DELETE FROM transactions_local WHERE id = ?1", [&incoming.id])?;
        Ok(())
    } else {
        write_clean(conn, incoming)
    }
}

fn apply_remote_in(
    tx: &Transaction,
    ctx: &mut MutationContext,
    tenant: &TenantId,
    incoming: &LedgerRecord,
) -> Result<ApplyOutcome> {
    if incoming.tenant_id != *tenant {
        warn!(tenant = %tenant, id = %incoming.id, other = %incoming.tenant_id, "Ignoring row of another tenant");
        return Ok(ApplyOutcome::ForeignTenant);
    }

    let Some(state) = row_state(tx, &incoming.id)? else {
        if incoming.deleted {
            return Ok(ApplyOutcome::TombstoneIgnored);
        }
        write_clean(tx, incoming)?;
        ctx.record_change(tenant, &incoming.id, EventType::RemoteApplied, None, Some(incoming.version));
        return Ok(ApplyOutcome::Inserted);
    };

    if state.tenant_id != tenant.as_str() {
        warn!(tenant = %tenant, id = %incoming.id, "Local id already used by another tenant");
        return Ok(ApplyOutcome::ForeignTenant);
    }

    if !state.dirty {
        if incoming.version <= state.version {
            return Ok(ApplyOutcome::Stale);
        }
        take_remote(tx, incoming)?;
        ctx.record_change(
            tenant,
            &incoming.id,
            EventType::RemoteApplied,
            Some(state.version),
            Some(incoming.version),
        );
        return Ok(if incoming.deleted {
            ApplyOutcome::Removed
        } else {
            ApplyOutcome::Updated
        });
    }

    match resolve(state.version, incoming.version) {
        Resolution::RemoteWins => {
            debug!(tenant = %tenant, id = %incoming.id, local = state.version, remote = incoming.version, "Remote wins conflict");
            take_remote(tx, incoming)?;
            ctx.record_change(
                tenant,
                &incoming.id,
                EventType::ConflictRemoteWon,
                Some(state.version),
                Some(incoming.version),
            );
            Ok(ApplyOutcome::RemoteWon)
        }
        Resolution::LocalWins => {
            ctx.events.push(
                Event::new(tenant.as_str(), &incoming.id, EventType::ConflictLocalWon, &ctx.actor)
                    .with_versions(Some(state.version), Some(state.version))
                    .with_comment(&format!("remote v{} ignored", incoming.version)),
            );
            Ok(ApplyOutcome::LocalWon)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RECORD_SCHEMA_VERSION;

    const TENANT_A: &str = "7d444840-9dc0-11d1-b245-5ffdce74fad2";
    const TENANT_B: &str = "0b5a57b8-3a8f-4b9e-9d0c-1b2f1e0c6a11";

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    fn record(tenant_id: &str, id: &str, amount: i64) -> LedgerRecord {
        LedgerRecord {
            id: id.to_string(),
            tenant_id: tenant(tenant_id),
            kind: RecordKind::Expense,
            date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            amount_minor_units: amount,
            description: format!("item {id}"),
            version: 0,
            deleted: false,
            schema_version: RECORD_SCHEMA_VERSION,
        }
    }

    fn remote(tenant_id: &str, id: &str, version: i64, amount: i64) -> RemoteRecord {
        let mut rec = record(tenant_id, id, amount);
        rec.version = version;
        RemoteRecord {
            record: rec,
            updated_at: 1_000 + version,
        }
    }

    #[test]
    fn test_upsert_new_record_is_dirty_v1() {
        let mut store = LocalStore::open_memory().unwrap();
        let local = store.upsert_local(&record(TENANT_A, "r1", 500)).unwrap();

        assert!(local.dirty);
        assert_eq!(local.record.version, 1);
        assert_eq!(local.base_version, 0);

        let events = store.events(&tenant(TENANT_A), "r1", None).unwrap();
        assert_eq!(events[0].event_type, EventType::RecordCreated);
        assert_eq!(events[0].actor, ACTOR_USER);
    }

    #[test]
    fn test_edit_bumps_version_and_clears_error() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        store.upsert_local(&record(TENANT_A, "r1", 500)).unwrap();
        store.mark_sync_error(&t, "r1", "amount too large").unwrap();

        let edited = store.upsert_local(&record(TENANT_A, "r1", 600)).unwrap();
        assert_eq!(edited.record.version, 2);
        assert_eq!(edited.record.amount_minor_units, 600);
        assert!(edited.sync_error.is_none());
        assert!(edited.dirty);
    }

    #[test]
    fn test_upsert_rejects_cross_tenant_id() {
        let mut store = LocalStore::open_memory().unwrap();
        store.upsert_local(&record(TENANT_A, "shared", 1)).unwrap();

        let err = store.upsert_local(&record(TENANT_B, "shared", 2)).unwrap_err();
        assert!(matches!(err, Error::TenantMismatch { .. }));
        assert!(store.get(&tenant(TENANT_B), "shared").unwrap().is_none());
    }

    #[test]
    fn test_upsert_rejects_empty_id() {
        let mut store = LocalStore::open_memory().unwrap();
        let err = store.upsert_local(&record(TENANT_A, "  ", 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_delete_tombstones_and_bumps_version() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        store.upsert_local(&record(TENANT_A, "r1", 500)).unwrap();
        store.mark_synced(&t, "r1", 1, Some(1)).unwrap();

        let tomb = store.delete_local(&t, "r1").unwrap();
        assert!(tomb.record.deleted);
        assert!(tomb.dirty);
        assert_eq!(tomb.record.version, 2);

        // Second delete is a no-op
        let again = store.delete_local(&t, "r1").unwrap();
        assert_eq!(again.record.version, 2);

        assert!(store.list(&t, false).unwrap().is_empty());
        assert_eq!(store.list(&t, true).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_is_tenant_scoped() {
        let mut store = LocalStore::open_memory().unwrap();
        store.upsert_local(&record(TENANT_A, "r1", 500)).unwrap();
        let err = store.delete_local(&tenant(TENANT_B), "r1").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_list_dirty_is_ordered_and_scoped() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        store.upsert_local(&record(TENANT_A, "first", 1)).unwrap();
        store.upsert_local(&record(TENANT_B, "other", 2)).unwrap();
        store.upsert_local(&record(TENANT_A, "second", 3)).unwrap();
        store.upsert_local(&record(TENANT_A, "flagged", 4)).unwrap();
        store.mark_sync_error(&t, "flagged", "rejected").unwrap();

        let batch = store.list_dirty(&t).unwrap();
        let ids: Vec<_> = batch.records.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert!(batch.quarantined.is_empty());
    }

    #[test]
    fn test_list_dirty_quarantines_corrupt_rows() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        store.upsert_local(&record(TENANT_A, "good", 1)).unwrap();
        store.upsert_local(&record(TENANT_A, "bad", 2)).unwrap();
        store
            .conn()
            .execute(
                "UPDATE transactions_local SET amount_minor_units = 'twelve' WHERE id = 'bad'",
                [],
            )
            .unwrap();

        let batch = store.list_dirty(&t).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].record.id, "good");
        assert_eq!(batch.quarantined.len(), 1);
        assert_eq!(batch.quarantined[0].id, "bad");

        // Quarantined rows stay out of later snapshots
        let batch = store.list_dirty(&t).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert!(batch.quarantined.is_empty());

        let summary = store.sync_summary(&t).unwrap();
        assert_eq!(summary.error_count, 1);

        let err = store.get(&t, "bad").unwrap_err();
        assert!(matches!(err, Error::LocalStoreCorruption { .. }));
    }

    #[test]
    fn test_mark_synced_clears_dirty() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        store.upsert_local(&record(TENANT_A, "r1", 500)).unwrap();

        let outcome = store.mark_synced(&t, "r1", 1, Some(1)).unwrap();
        assert_eq!(outcome, SyncedOutcome::Cleared);

        let local = store.get(&t, "r1").unwrap().unwrap();
        assert!(!local.dirty);
        assert_eq!(local.record.version, 1);
        assert_eq!(local.base_version, 1);
    }

    #[test]
    fn test_mark_synced_missing_row() {
        let mut store = LocalStore::open_memory().unwrap();
        let err = store
            .mark_synced(&tenant(TENANT_A), "ghost", 1, None)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_mark_synced_keeps_edit_made_in_flight() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        store.upsert_local(&record(TENANT_A, "r1", 500)).unwrap();
        // Sent at v1, user edits to v2 before the ack arrives
        store.upsert_local(&record(TENANT_A, "r1", 700)).unwrap();

        let outcome = store.mark_synced(&t, "r1", 1, Some(1)).unwrap();
        assert_eq!(outcome, SyncedOutcome::StillDirty { version: 2 });

        let local = store.get(&t, "r1").unwrap().unwrap();
        assert!(local.dirty);
        assert_eq!(local.base_version, 1);
        assert_eq!(local.record.amount_minor_units, 700);
    }

    #[test]
    fn test_acknowledged_tombstone_is_purged() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        store.upsert_local(&record(TENANT_A, "r1", 500)).unwrap();
        store.delete_local(&t, "r1").unwrap();

        let outcome = store.mark_synced(&t, "r1", 2, Some(2)).unwrap();
        assert_eq!(outcome, SyncedOutcome::Purged);
        assert!(store.get(&t, "r1").unwrap().is_none());

        let events = store.events(&t, "r1", None).unwrap();
        assert_eq!(events[0].event_type, EventType::TombstonePurged);
    }

    #[test]
    fn test_apply_remote_insert_and_stale() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);

        let outcome = store.apply_remote(&t, &remote(TENANT_A, "r1", 3, 900)).unwrap();
        assert_eq!(outcome, ApplyOutcome::Inserted);
        let local = store.get(&t, "r1").unwrap().unwrap();
        assert!(!local.dirty);
        assert_eq!(local.record.version, 3);
        assert_eq!(local.base_version, 3);

        let outcome = store.apply_remote(&t, &remote(TENANT_A, "r1", 3, 1)).unwrap();
        assert_eq!(outcome, ApplyOutcome::Stale);
        let outcome = store.apply_remote(&t, &remote(TENANT_A, "r1", 2, 1)).unwrap();
        assert_eq!(outcome, ApplyOutcome::Stale);
        assert_eq!(store.get(&t, "r1").unwrap().unwrap().record.amount_minor_units, 900);

        let outcome = store.apply_remote(&t, &remote(TENANT_A, "r1", 4, 950)).unwrap();
        assert_eq!(outcome, ApplyOutcome::Updated);
        assert_eq!(store.get(&t, "r1").unwrap().unwrap().record.amount_minor_units, 950);
    }

    #[test]
    fn test_apply_remote_tombstones() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);

        let mut tomb = remote(TENANT_A, "never-seen", 2, 0);
        tomb.record.deleted = true;
        assert_eq!(store.apply_remote(&t, &tomb).unwrap(), ApplyOutcome::TombstoneIgnored);
        assert!(store.get(&t, "never-seen").unwrap().is_none());

        store.apply_remote(&t, &remote(TENANT_A, "r1", 1, 10)).unwrap();
        let mut tomb = remote(TENANT_A, "r1", 2, 10);
        tomb.record.deleted = true;
        assert_eq!(store.apply_remote(&t, &tomb).unwrap(), ApplyOutcome::Removed);
        assert!(store.get(&t, "r1").unwrap().is_none());
    }

    #[test]
    fn test_apply_remote_conflict_remote_wins() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        store.upsert_local(&record(TENANT_A, "r1", 100)).unwrap(); // dirty v1

        let outcome = store.apply_remote(&t, &remote(TENANT_A, "r1", 5, 999)).unwrap();
        assert_eq!(outcome, ApplyOutcome::RemoteWon);
        assert!(outcome.is_conflict());

        let local = store.get(&t, "r1").unwrap().unwrap();
        assert!(!local.dirty);
        assert_eq!(local.record.version, 5);
        assert_eq!(local.record.amount_minor_units, 999);
    }

    #[test]
    fn test_apply_remote_conflict_local_wins() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        store.upsert_local(&record(TENANT_A, "r1", 100)).unwrap();
        store.upsert_local(&record(TENANT_A, "r1", 200)).unwrap();
        store.upsert_local(&record(TENANT_A, "r1", 300)).unwrap(); // dirty v3

        let outcome = store.apply_remote(&t, &remote(TENANT_A, "r1", 2, 999)).unwrap();
        assert_eq!(outcome, ApplyOutcome::LocalWon);

        let local = store.get(&t, "r1").unwrap().unwrap();
        assert!(local.dirty);
        assert_eq!(local.record.version, 3);
        assert_eq!(local.record.amount_minor_units, 300);
    }

    #[test]
    fn test_apply_remote_never_crosses_tenants() {
        let mut store = LocalStore::open_memory().unwrap();
        let a = tenant(TENANT_A);

        let outcome = store.apply_remote(&a, &remote(TENANT_B, "r1", 1, 10)).unwrap();
        assert_eq!(outcome, ApplyOutcome::ForeignTenant);
        assert!(store.get(&tenant(TENANT_B), "r1").unwrap().is_none());

        // Id collision with a row owned by another tenant
        store.upsert_local(&record(TENANT_B, "dup", 1)).unwrap();
        let outcome = store.apply_remote(&a, &remote(TENANT_A, "dup", 9, 10)).unwrap();
        assert_eq!(outcome, ApplyOutcome::ForeignTenant);
        let theirs = store.get(&tenant(TENANT_B), "dup").unwrap().unwrap();
        assert_eq!(theirs.record.version, 1);
    }

    #[test]
    fn test_batch_advances_cursor_monotonically() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        assert_eq!(store.cursor(&t).unwrap(), 0);

        let page = vec![remote(TENANT_A, "r1", 1, 10), remote(TENANT_A, "r2", 1, 20)];
        let applied = store.apply_remote_batch(&t, &page, 1_500).unwrap();
        assert_eq!(applied.cursor, 1_500);
        assert_eq!(applied.outcomes.len(), 2);

        // An older watermark never moves it back
        let applied = store.apply_remote_batch(&t, &[], 1_200).unwrap();
        assert_eq!(applied.cursor, 1_500);
        assert_eq!(store.advance_cursor(&t, 900).unwrap(), 1_500);
        assert_eq!(store.advance_cursor(&t, 2_000).unwrap(), 2_000);

        // Cursors are per tenant
        assert_eq!(store.cursor(&tenant(TENANT_B)).unwrap(), 0);
    }

    #[test]
    fn test_rebase_local_moves_above_server() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        store.upsert_local(&record(TENANT_A, "r1", 100)).unwrap();

        let version = store.rebase_local(&t, "r1", 4).unwrap();
        assert_eq!(version, 5);

        let local = store.get(&t, "r1").unwrap().unwrap();
        assert!(local.dirty);
        assert_eq!(local.base_version, 4);
        assert_eq!(local.record.version, 5);
    }

    #[test]
    fn test_clear_sync_errors() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        store.upsert_local(&record(TENANT_A, "r1", 1)).unwrap();
        store.upsert_local(&record(TENANT_A, "r2", 2)).unwrap();
        store.mark_sync_error(&t, "r1", "bad").unwrap();
        store.mark_sync_error(&t, "r2", "bad").unwrap();

        assert_eq!(store.clear_sync_errors(&t, Some("r1")).unwrap(), 1);
        assert_eq!(store.clear_sync_errors(&t, Some("r1")).unwrap(), 0);
        assert_eq!(store.list_sync_errors(&t).unwrap().len(), 1);
        assert_eq!(store.clear_sync_errors(&t, None).unwrap(), 1);
        assert_eq!(store.list_dirty(&t).unwrap().records.len(), 2);

        let err = store.clear_sync_errors(&t, Some("nope")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_sync_summary() {
        let mut store = LocalStore::open_memory().unwrap();
        let t = tenant(TENANT_A);
        store.upsert_local(&record(TENANT_A, "r1", 1)).unwrap();
        store.upsert_local(&record(TENANT_A, "r2", 2)).unwrap();
        store.upsert_local(&record(TENANT_A, "r3", 3)).unwrap();
        store.mark_synced(&t, "r1", 1, Some(1)).unwrap();
        store.mark_sync_error(&t, "r2", "rejected").unwrap();
        store.record_cycle_success(&t, 42).unwrap();

        let summary = store.sync_summary(&t).unwrap();
        assert_eq!(summary.pending_count, 1);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.last_synced_at, Some(42));

        store.record_cycle_failure(&t, "offline").unwrap();
        let summary = store.sync_summary(&t).unwrap();
        assert_eq!(summary.last_error.as_deref(), Some("offline"));
        assert_eq!(summary.last_synced_at, Some(42));
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let t = tenant(TENANT_A);

        {
            let mut store = LocalStore::open(&path).unwrap();
            store.upsert_local(&record(TENANT_A, "r1", 1234)).unwrap();
            store.advance_cursor(&t, 77).unwrap();
        }

        let store = LocalStore::open(&path).unwrap();
        let local = store.get(&t, "r1").unwrap().unwrap();
        assert_eq!(local.record.amount_minor_units, 1234);
        assert!(local.dirty);
        assert_eq!(store.cursor(&t).unwrap(), 77);
    }
}
