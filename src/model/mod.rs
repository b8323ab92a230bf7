//! Data models for the ledger sync engine.
//!
//! This module contains the domain models:
//! - TenantId (validated company identifier)
//! - LedgerRecord (a cash-flow transaction)
//! - LocalRecord (a record plus its local-only sync bookkeeping)

pub mod record;
pub mod tenant;

pub use record::{
    LedgerRecord, LocalRecord, NewTransaction, RecordKind, RemoteRecord, RECORD_SCHEMA_VERSION,
};
pub use tenant::TenantId;
