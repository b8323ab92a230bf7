//! SQLite storage layer for the local ledger mirror.
//!
//! - WAL mode so the UI can read while a reconciler writes
//! - IMMEDIATE transactions for every mutation
//! - Per-row dirty/version bookkeeping for the push queue
//! - Audit events for every write and reconciliation decision
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`migrations`] - Embedded SQL migrations
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - `LocalStore` implementation

pub mod events;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use events::{Event, EventType};
pub use sqlite::{
    ACTOR_SYNC, ACTOR_USER, AppliedBatch, ApplyOutcome, DirtyBatch, LocalStore, MutationContext,
    QuarantinedRow, SyncSummary, SyncedOutcome,
};
