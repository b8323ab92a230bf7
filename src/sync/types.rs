//! Types shared by the reconcilers, the engine and the scheduler.

use serde::Serialize;
use std::time::Duration;

use crate::error::Error;

/// Where a tenant's sync cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Pushing,
    Pulling,
    /// No tenant could be resolved; cleared only by a new login
    Faulted,
}

impl SyncState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pushing => "pushing",
            Self::Pulling => "pulling",
            Self::Faulted => "faulted",
        }
    }
}

/// What asked for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// App came to the foreground
    Foreground,
    /// Network came back
    ConnectivityRegained,
    /// Interval timer while foregrounded
    Timer,
    /// User pulled to refresh / ran `sync`
    Manual,
}

impl Trigger {
    /// Whether this trigger overrides (and resets) an active backoff window.
    #[must_use]
    pub const fn bypasses_backoff(&self) -> bool {
        matches!(self, Self::ConnectivityRegained | Self::Manual)
    }
}

/// Which step of a cycle produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Resolve,
    Push,
    Pull,
}

/// Classification of sync errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// Network, timeout, 5xx: retried after backoff
    Transient,
    /// Remote refused the record; needs the user
    Validation,
    /// Lost a version race that could not be settled this pass
    Conflict,
    /// Session no longer accepted
    Auth,
    /// No tenant could be resolved
    NoTenant,
    /// A row arrived for the wrong tenant
    TenantMismatch,
    /// A local row could not be decoded and was quarantined
    Corruption,
    /// Local database failure
    Storage,
    Cancelled,
}

impl From<&Error> for SyncErrorKind {
    fn from(error: &Error) -> Self {
        match error {
            Error::TransientNetwork(_) => Self::Transient,
            Error::Validation(_) | Error::InvalidArgument(_) => Self::Validation,
            Error::Conflict { .. } => Self::Conflict,
            Error::Unauthorized(_) => Self::Auth,
            Error::NoTenantResolved => Self::NoTenant,
            Error::TenantMismatch { .. } => Self::TenantMismatch,
            Error::LocalStoreCorruption { .. } => Self::Corruption,
            Error::Cancelled => Self::Cancelled,
            _ => Self::Storage,
        }
    }
}

/// One problem observed during a cycle. Collected, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncErrorEvent {
    pub phase: SyncPhase,
    pub kind: SyncErrorKind,
    pub tenant: Option<String>,
    pub id: Option<String>,
    pub message: String,
}

impl SyncErrorEvent {
    #[must_use]
    pub fn new(phase: SyncPhase, error: &Error) -> Self {
        Self {
            phase,
            kind: SyncErrorKind::from(error),
            tenant: None,
            id: None,
            message: error.to_string(),
        }
    }

    #[must_use]
    pub fn for_tenant(mut self, tenant: &impl ToString) -> Self {
        self.tenant = Some(tenant.to_string());
        self
    }

    #[must_use]
    pub fn for_record(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

/// Why a trigger did not start a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    /// A cycle for the tenant is already in progress
    AlreadyRunning,
    /// Tenant is backing off after a transient failure
    Backoff { retry_in_ms: u64 },
    Offline,
    Faulted,
}

/// Outcome of one cycle (or one pass of it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Rows acknowledged by the remote
    pub pushed: usize,
    /// Remote rows that changed the local mirror
    pub pulled: usize,
    /// Version conflicts settled by the conflict policy
    pub conflicts: usize,
    pub errors: Vec<SyncErrorEvent>,
    /// A pass stopped early (network, auth or cancellation)
    pub interrupted: bool,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

impl SyncReport {
    /// A report for a trigger that did not run.
    #[must_use]
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn merge(&mut self, other: Self) {
        self.pushed += other.pushed;
        self.pulled += other.pulled;
        self.conflicts += other.conflicts;
        self.errors.extend(other.errors);
        self.interrupted |= other.interrupted;
        self.cancelled |= other.cancelled;
    }

    /// Whether the cycle hit something worth backing off for.
    #[must_use]
    pub fn has_transient_failure(&self) -> bool {
        self.errors.iter().any(|e| e.kind == SyncErrorKind::Transient)
    }

    /// Whether this report describes a cycle that actually ran.
    #[must_use]
    pub fn ran(&self) -> bool {
        self.skipped.is_none()
    }
}

/// Per-tenant status shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub tenant: Option<String>,
    pub pending_count: usize,
    pub error_count: usize,
    pub last_synced_at: Option<i64>,
    pub last_error: Option<String>,
    pub faulted: bool,
    pub state: SyncState,
}

/// Tunables for the reconcilers and the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Rows per write call
    pub push_batch_size: usize,
    /// Rows per change-feed page
    pub pull_page_size: usize,
    /// Upper bound on any single network call
    pub request_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_factor: u32,
    pub backoff_cap: Duration,
    /// Timer trigger period while foregrounded
    pub interval: Duration,
    /// How long a backgrounded app may keep syncing
    pub background_grace: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            push_batch_size: 25,
            pull_page_size: 200,
            request_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_secs(2),
            backoff_factor: 2,
            backoff_cap: Duration::from_secs(300),
            interval: Duration::from_secs(60),
            background_grace: Duration::from_secs(30),
        }
    }
}
