//! Ledger record model.
//!
//! A `LedgerRecord` is one cash-flow transaction. Its id is generated on the
//! client so offline-created records already have their final identity.
//! Amounts are integer minor currency units; there is no floating point
//! anywhere in the record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::tenant::TenantId;

/// Current record schema version written by this build.
///
/// Bumped whenever a column is added to `transactions_local`, so rows
/// written by older builds can be migrated instead of guessed at.
pub const RECORD_SCHEMA_VERSION: i32 = 1;

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Income,
    Expense,
}

impl RecordKind {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown record kind: {s}")),
        }
    }
}

/// A ledger record as exchanged with the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Client-generated UUID, stable across the local/remote boundary
    pub id: String,

    /// Owning company
    pub tenant_id: TenantId,

    pub kind: RecordKind,

    /// Calendar date of the transaction
    pub date: NaiveDate,

    /// Amount in minor currency units (cents)
    pub amount_minor_units: i64,

    pub description: String,

    /// Strictly increasing on every successful write, local or remote
    pub version: i64,

    /// Tombstone flag
    #[serde(default)]
    pub deleted: bool,

    /// Record layout version
    #[serde(default = "default_schema_version")]
    pub schema_version: i32,
}

fn default_schema_version() -> i32 {
    RECORD_SCHEMA_VERSION
}

/// A record held in the local store, with its local-only sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecord {
    #[serde(flatten)]
    pub record: LedgerRecord,

    /// Has unsynced local mutations
    pub dirty: bool,

    /// Last version the remote is known to hold (0 = never synced)
    pub base_version: i64,

    /// Set when the remote rejected the row or it was quarantined
    pub sync_error: Option<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last local write timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl LocalRecord {
    /// Whether the row is waiting for an automatic push.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.dirty && self.sync_error.is_none()
    }
}

/// A record as returned by the remote store's change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    #[serde(flatten)]
    pub record: LedgerRecord,

    /// Server-side modification watermark (Unix milliseconds)
    pub updated_at: i64,
}

/// Fields the UI supplies when entering a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Existing id when editing; a fresh UUID is generated when `None`
    pub id: Option<String>,
    pub kind: RecordKind,
    pub date: NaiveDate,
    pub amount_minor_units: i64,
    pub description: String,
}

impl NewTransaction {
    /// Build the record to upsert for the given tenant.
    ///
    /// The version is left at 0; the local store assigns the real one.
    #[must_use]
    pub fn into_record(self, tenant_id: TenantId) -> LedgerRecord {
        LedgerRecord {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            tenant_id,
            kind: self.kind,
            date: self.date,
            amount_minor_units: self.amount_minor_units,
            description: self.description,
            version: 0,
            deleted: false,
            schema_version: RECORD_SCHEMA_VERSION,
        }
    }
}
