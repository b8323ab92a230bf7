//! Database migrations embedded at compile time.
//!
//! Migrations live in `/migrations/` at the crate root and are embedded
//! with `include_str!`, so the binary carries no runtime file dependencies.

use rusqlite::{Connection, Result};
use tracing::{info, warn};

/// A single migration with version identifier and SQL content.
struct Migration {
    version: &'static str,
    sql: &'static str,
}

/// All migrations in order.
///
/// Version names match the SQL filenames (without .sql extension).
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001_record_schema_version",
        sql: include_str!("../../migrations/001_record_schema_version.sql"),
    },
    Migration {
        version: "002_sync_state_timestamps",
        sql: include_str!("../../migrations/002_sync_state_timestamps.sql"),
    },
    Migration {
        version: "003_sync_events_index",
        sql: include_str!("../../migrations/003_sync_events_index.sql"),
    },
];

/// Number of embedded migrations, reported by `ledger-sync version`.
#[must_use]
pub const fn migration_count() -> usize {
    MIGRATIONS.len()
}

/// Run all pending migrations on the database.
///
/// Already-applied migrations (tracked in `schema_migrations`) are skipped.
///
/// # Errors
///
/// Returns an error if a migration fails to apply. An ALTER TABLE that hits
/// a column added by hand is logged and treated as applied.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let applied: std::collections::HashSet<String> = conn
        .prepare("SELECT version FROM schema_migrations")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    for migration in MIGRATIONS {
        if applied.contains(migration.version) {
            continue;
        }

        info!(version = migration.version, "Applying migration");

        if let Err(e) = conn.execute_batch(migration.sql) {
            if e.to_string().contains("duplicate column name") {
                warn!(
                    version = migration.version,
                    "Migration partially applied (columns exist), marking complete"
                );
            } else {
                return Err(e);
            }
        }

        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().timestamp_millis()],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::SCHEMA_SQL;

    fn count_applied(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version NOT LIKE 'v%'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_run_migrations_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();
        run_migrations(&conn).expect("Migrations should apply to fresh database");
        assert_eq!(count_applied(&conn), MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_run_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).expect("Second run should succeed");
        assert_eq!(count_applied(&conn), MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_upgrades_pre_schema_version_table() {
        let conn = Connection::open_in_memory().unwrap();
        // Layout shipped before records carried a schema version
        conn.execute_batch(
            "CREATE TABLE transactions_local (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
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
            CREATE TABLE sync_state (
                tenant_id TEXT PRIMARY KEY,
                cursor INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE sync_events (
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
            INSERT INTO transactions_local (id, tenant_id, kind, date, amount_minor_units, created_at, updated_at)
            VALUES ('old', 't', 'income', '2025-12-01', 100, 0, 0);",
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let schema_version: i32 = conn
            .query_row(
                "SELECT schema_version FROM transactions_local WHERE id = 'old'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(schema_version, 1);

        let has_last_synced: bool = conn
            .prepare("SELECT 1 FROM pragma_table_info('sync_state') WHERE name = 'last_synced_at'")
            .unwrap()
            .exists([])
            .unwrap();
        assert!(has_last_synced);
    }
}
