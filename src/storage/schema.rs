//! Database schema definitions.
//!
//! The base DDL is the first shipped layout. Every later change lives in a
//! numbered file under `migrations/`, so new and old databases take the
//! same upgrade path.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Base SQL schema for the local mirror, before migrations.
///
/// Timestamps are INTEGER Unix milliseconds. Dates are ISO `YYYY-MM-DD` text.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Ledger Mirror
-- ====================

-- One row per ledger record, partitioned by tenant. kind/date/amount are
-- validated on read so a damaged row can be quarantined instead of
-- failing the whole scan.
CREATE TABLE IF NOT EXISTS transactions_local (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL CHECK (length(tenant_id) > 0),
    kind TEXT NOT NULL,
    date TEXT NOT NULL,
    amount_minor_units INTEGER NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    version INTEGER NOT NULL DEFAULT 1,
    base_version INTEGER NOT NULL DEFAULT 0,
    dirty INTEGER NOT NULL DEFAULT 1,
    deleted INTEGER NOT NULL DEFAULT 0,
    sync_error TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_tenant_dirty ON transactions_local(tenant_id, dirty);
CREATE INDEX IF NOT EXISTS idx_transactions_tenant_created ON transactions_local(tenant_id, created_at);
CREATE INDEX IF NOT EXISTS idx_transactions_tenant_date ON transactions_local(tenant_id, date);

-- ====================
-- Sync Bookkeeping
-- ====================

-- Per-tenant pull watermark and cycle status
CREATE TABLE IF NOT EXISTS sync_state (
    tenant_id TEXT PRIMARY KEY,
    cursor INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);

-- Audit trail of every local mutation and reconciliation decision
CREATE TABLE IF NOT EXISTS sync_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    record_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_version INTEGER,
    new_version INTEGER,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_events_record ON sync_events(tenant_id, record_id);
";

/// Apply the schema to a database connection.
///
/// Safe to call on every open: all DDL is `IF NOT EXISTS` and migrations
/// are tracked.
///
/// # Errors
///
/// Returns an error if a pragma, the DDL or a migration fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    super::migrations::run_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
