//! Offline-first synchronization.
//!
//! The local SQLite mirror is authoritative for the user's unsynced edits;
//! the remote store is authoritative for everything it has accepted. A
//! sync cycle reconciles the two for exactly one tenant:
//!
//! 1. **Push**: dirty rows go out oldest first, each carrying `version` and
//!    `base_version`. Acknowledged rows are cleared; a replayed write whose
//!    acknowledgment was lost is recognized by version and content hash.
//! 2. **Pull**: rows changed since the tenant's cursor come back page by
//!    page; each page and the new cursor commit together.
//!
//! Conflicts are settled by [`conflict::resolve`], a pure function of the
//! two versions. Wall clocks are never compared.
//!
//! # Example
//!
//! ```ignore
//! use ledger_sync::sync::{SyncEngine, Trigger};
//!
//! let engine = SyncEngine::new(store, remote, resolver, options);
//! engine.record_transaction(fields).await?;
//! let report = engine.run_cycle(Trigger::Manual).await;
//! ```

pub mod backoff;
pub mod conflict;
pub mod engine;
pub mod hash;
pub mod pull;
pub mod push;
pub mod scheduler;
pub mod types;

use parking_lot::Mutex;
use std::sync::Arc;

use crate::storage::LocalStore;

pub use conflict::{resolve, Resolution};
pub use engine::SyncEngine;
pub use pull::PullReconciler;
pub use push::PushReconciler;
pub use scheduler::{LifecycleEvent, SchedulerHandle};
pub use types::{
    SkipReason, SyncErrorEvent, SyncErrorKind, SyncOptions, SyncPhase, SyncReport, SyncState,
    SyncStatus, Trigger,
};

/// The local store as shared between the UI path and the reconcilers.
///
/// Lock for one store call at a time; never across an `.await`.
pub type SharedStore = Arc<Mutex<LocalStore>>;
