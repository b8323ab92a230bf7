//! Sync cycle state machine.
//!
//! [`SyncEngine`] owns the shared local store handle, the remote gateway
//! and the tenant resolver. A cycle for one tenant goes
//! `Idle → Pushing → Pulling → Idle`; failing to resolve a tenant puts the
//! whole engine in `Faulted` until the next [`login`](SyncEngine::login).
//!
//! One worker per tenant: a second trigger for a tenant whose cycle is
//! still running is skipped, not queued. Different tenants may sync at the
//! same time.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::pull::PullReconciler;
use super::push::PushReconciler;
use super::types::{
    SkipReason, SyncErrorEvent, SyncOptions, SyncPhase, SyncReport, SyncState, SyncStatus, Trigger,
};
use super::SharedStore;
use crate::error::{Error, Result};
use crate::model::{LedgerRecord, NewTransaction, TenantId};
use crate::remote::RemoteStore;
use crate::tenant::{AuthSession, TenantResolver};

/// Drives sync cycles and serves the UI-facing operations.
pub struct SyncEngine {
    store: SharedStore,
    remote: Arc<dyn RemoteStore>,
    resolver: Arc<TenantResolver>,
    options: SyncOptions,
    session: Mutex<Option<AuthSession>>,
    faulted: AtomicBool,
    workers: Mutex<HashMap<TenantId, Arc<TokioMutex<()>>>>,
    states: Mutex<HashMap<TenantId, SyncState>>,
    backoff: Mutex<HashMap<TenantId, Backoff>>,
    cancel: Mutex<CancellationToken>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        store: SharedStore,
        remote: Arc<dyn RemoteStore>,
        resolver: Arc<TenantResolver>,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            remote,
            resolver,
            options,
            session: Mutex::new(None),
            faulted: AtomicBool::new(false),
            workers: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
            backoff: Mutex::new(HashMap::new()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    #[must_use]
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    // ==================
    // Session
    // ==================

    /// Start a session. Clears `Faulted` and forgets the cached tenant so
    /// the next cycle resolves it for this session.
    pub fn login(&self, session: AuthSession) {
        info!(user = %session.user_id, "Session started");
        *self.session.lock() = Some(session);
        self.resolver.invalidate();
        self.faulted.store(false, Ordering::SeqCst);
    }

    /// End the session: cancel in-flight cycles and drop per-tenant state.
    pub fn logout(&self) {
        self.cancel();
        *self.session.lock() = None;
        self.resolver.invalidate();
        self.states.lock().clear();
        self.backoff.lock().clear();
        info!("Session ended");
    }

    /// Cancel cycles in flight. They stop at the next batch boundary;
    /// cycles started afterwards are unaffected.
    pub fn cancel(&self) {
        let previous = std::mem::take(&mut *self.cancel.lock());
        previous.cancel();
        debug!("Cancellation requested");
    }

    /// Tenant for the current session.
    ///
    /// # Errors
    ///
    /// `NoTenantResolved` if no identity source yields a tenant.
    pub async fn current_tenant(&self) -> Result<TenantId> {
        let session = self.session.lock().clone();
        self.resolver.resolve_tenant_id(session.as_ref()).await
    }

    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }

    /// Cycle state of one tenant.
    #[must_use]
    pub fn state(&self, tenant: &TenantId) -> SyncState {
        if self.is_faulted() {
            return SyncState::Faulted;
        }
        self.states.lock().get(tenant).copied().unwrap_or_default()
    }

    // ==================
    // UI operations
    // ==================

    /// Save a transaction locally. It is pushed by a later cycle.
    ///
    /// # Errors
    ///
    /// `NoTenantResolved` without a tenant (nothing is written), or any
    /// local store error.
    pub async fn record_transaction(&self, fields: NewTransaction) -> Result<LedgerRecord> {
        if fields.amount_minor_units < 0 {
            return Err(Error::InvalidArgument(
                "amount must not be negative; use the kind to mark an expense".into(),
            ));
        }
        let tenant = self.current_tenant().await?;
        let record = fields.into_record(tenant);
        let stored = self.store.lock().upsert_local(&record)?;
        Ok(stored.record)
    }

    /// Tombstone a transaction of the current tenant.
    ///
    /// # Errors
    ///
    /// `NoTenantResolved`, or `NotFound` if the tenant has no such row.
    pub async fn delete_transaction(&self, id: &str) -> Result<LedgerRecord> {
        let tenant = self.current_tenant().await?;
        let deleted = self.store.lock().delete_local(&tenant, id)?;
        Ok(deleted.record)
    }

    /// Put rows flagged by a rejected push back in the queue.
    ///
    /// # Errors
    ///
    /// `NoTenantResolved`, or `NotFound` for an unknown id.
    pub async fn retry_failed(&self, id: Option<&str>) -> Result<usize> {
        let tenant = self.current_tenant().await?;
        let cleared = self.store.lock().clear_sync_errors(&tenant, id)?;
        if cleared > 0 {
            info!(tenant = %tenant, cleared, "Flagged rows queued again");
        }
        Ok(cleared)
    }

    /// Status of one tenant for display.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be read.
    pub fn get_sync_status(&self, tenant: &TenantId) -> Result<SyncStatus> {
        let summary = self.store.lock().sync_summary(tenant)?;
        Ok(SyncStatus {
            tenant: Some(tenant.to_string()),
            pending_count: summary.pending_count,
            error_count: summary.error_count,
            last_synced_at: summary.last_synced_at,
            last_error: summary.last_error,
            faulted: self.is_faulted(),
            state: self.state(tenant),
        })
    }

    /// Status of the current tenant. Without one, an empty faulted status.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be read.
    pub async fn sync_status(&self) -> Result<SyncStatus> {
        match self.current_tenant().await {
            Ok(tenant) => self.get_sync_status(&tenant),
            Err(Error::NoTenantResolved) => Ok(SyncStatus {
                tenant: None,
                pending_count: 0,
                error_count: 0,
                last_synced_at: None,
                last_error: None,
                faulted: true,
                state: SyncState::Faulted,
            }),
            Err(e) => Err(e),
        }
    }

    // ==================
    // Cycles
    // ==================

    /// Run one cycle for the current tenant.
    ///
    /// Without a resolvable tenant the engine faults before any network
    /// call or local write.
    pub async fn run_cycle(&self, trigger: Trigger) -> SyncReport {
        if self.is_faulted() {
            debug!(?trigger, "Engine faulted, skipping trigger");
            return SyncReport::skipped(SkipReason::Faulted);
        }

        let tenant = match self.current_tenant().await {
            Ok(tenant) => tenant,
            Err(e) => {
                warn!(error = %e, "No tenant resolved, sync faulted");
                self.faulted.store(true, Ordering::SeqCst);
                let mut report = SyncReport::default();
                report.errors.push(SyncErrorEvent::new(SyncPhase::Resolve, &e));
                report.interrupted = true;
                return report;
            }
        };

        self.sync_tenant(&tenant, trigger).await
    }

    /// Run one cycle for an already-resolved tenant.
    pub async fn sync_tenant(&self, tenant: &TenantId, trigger: Trigger) -> SyncReport {
        if let Some(wait) = self.backoff_remaining(tenant, trigger) {
            debug!(tenant = %tenant, ?trigger, wait_ms = wait.as_millis(), "Backing off");
            return SyncReport::skipped(SkipReason::Backoff {
                retry_in_ms: u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            });
        }

        let worker = self.worker(tenant);
        let Ok(_guard) = worker.try_lock_owned() else {
            debug!(tenant = %tenant, ?trigger, "Cycle already running");
            return SyncReport::skipped(SkipReason::AlreadyRunning);
        };

        let cancel = self.cancel.lock().clone();
        debug!(tenant = %tenant, ?trigger, "Sync cycle started");

        self.set_state(tenant, SyncState::Pushing);
        let mut report = PushReconciler::new(&self.store, self.remote.as_ref(), &self.options, &cancel)
            .push_pending(tenant)
            .await;

        if !report.interrupted {
            self.set_state(tenant, SyncState::Pulling);
            let pulled = PullReconciler::new(&self.store, self.remote.as_ref(), &self.options, &cancel)
                .pull_remote(tenant)
                .await;
            report.merge(pulled);
        }

        self.finish(tenant, &report);
        self.set_state(tenant, SyncState::Idle);
        report
    }

    fn backoff_remaining(&self, tenant: &TenantId, trigger: Trigger) -> Option<std::time::Duration> {
        let mut backoff = self.backoff.lock();
        if trigger.bypasses_backoff() {
            if let Some(window) = backoff.get_mut(tenant) {
                window.reset();
            }
            return None;
        }
        backoff.get(tenant).and_then(|w| w.remaining(Instant::now()))
    }

    fn worker(&self, tenant: &TenantId) -> Arc<TokioMutex<()>> {
        Arc::clone(
            self.workers
                .lock()
                .entry(tenant.clone())
                .or_insert_with(|| Arc::new(TokioMutex::new(()))),
        )
    }

    fn set_state(&self, tenant: &TenantId, state: SyncState) {
        self.states.lock().insert(tenant.clone(), state);
    }

    /// Update backoff and the persisted cycle outcome.
    fn finish(&self, tenant: &TenantId, report: &SyncReport) {
        {
            let mut backoff = self.backoff.lock();
            let window = backoff.entry(tenant.clone()).or_insert_with(|| {
                Backoff::new(
                    self.options.backoff_base,
                    self.options.backoff_factor,
                    self.options.backoff_cap,
                )
            });
            if report.has_transient_failure() {
                let delay = window.record_failure(Instant::now());
                info!(tenant = %tenant, failures = window.failures(), delay_ms = delay.as_millis(), "Transient failure, backing off");
            } else {
                window.reset();
            }
        }

        let outcome = if report.interrupted {
            let message = report
                .errors
                .first()
                .map_or_else(|| "cancelled".to_string(), |e| e.message.clone());
            self.store.lock().record_cycle_failure(tenant, &message)
        } else {
            let now = chrono::Utc::now().timestamp_millis();
            self.store.lock().record_cycle_success(tenant, now)
        };
        if let Err(e) = outcome {
            warn!(tenant = %tenant, error = %e, "Could not record cycle outcome");
        }

        info!(
            tenant = %tenant,
            pushed = report.pushed,
            pulled = report.pulled,
            conflicts = report.conflicts,
            errors = report.errors.len(),
            interrupted = report.interrupted,
            "Sync cycle finished"
        );
    }
}
