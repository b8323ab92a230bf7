//! Push reconciler: local dirty rows to the remote store.
//!
//! Rows of one tenant go out strictly in order, in batches. Every sent row
//! carries `version` and `base_version`; the remote answers per row and
//! each answer is folded back into the local store:
//!
//! - accepted: the row is marked synced (or purged, for a tombstone)
//! - conflict: either a replay of our own lost acknowledgment, or a real
//!   race settled by version
//! - rejected: the row is flagged and left for the user
//!
//! A network failure ends the pass with the remaining rows still dirty.

use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::conflict::{resolve, Resolution};
use super::hash::is_same_write;
use super::types::{SyncErrorEvent, SyncErrorKind, SyncOptions, SyncPhase, SyncReport};
use super::SharedStore;
use crate::error::{Error, Result};
use crate::model::{LedgerRecord, LocalRecord, RemoteRecord, TenantId};
use crate::remote::{OutboundRecord, RemoteStore, WriteOutcome, WriteResult};
use crate::storage::SyncedOutcome;

/// Pushes one tenant's dirty rows.
pub struct PushReconciler<'a> {
    store: &'a SharedStore,
    remote: &'a dyn RemoteStore,
    options: &'a SyncOptions,
    cancel: &'a CancellationToken,
}

impl<'a> PushReconciler<'a> {
    #[must_use]
    pub fn new(
        store: &'a SharedStore,
        remote: &'a dyn RemoteStore,
        options: &'a SyncOptions,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            store,
            remote,
            options,
            cancel,
        }
    }

    /// Push every dirty row of `tenant` that is not flagged.
    ///
    /// Never fails: problems are collected in the report.
    pub async fn push_pending(&self, tenant: &TenantId) -> SyncReport {
        let mut report = SyncReport::default();

        let snapshot = self.store.lock().list_dirty(tenant);
        let batch = match snapshot {
            Ok(batch) => batch,
            Err(e) => {
                report.errors.push(SyncErrorEvent::new(SyncPhase::Push, &e).for_tenant(tenant));
                report.interrupted = true;
                return report;
            }
        };

        for row in &batch.quarantined {
            report.errors.push(
                SyncErrorEvent::new(
                    SyncPhase::Push,
                    &Error::LocalStoreCorruption {
                        id: row.id.clone(),
                        reason: row.reason.clone(),
                    },
                )
                .for_tenant(tenant)
                .for_record(&row.id),
            );
        }

        if batch.records.is_empty() {
            return report;
        }
        debug!(tenant = %tenant, rows = batch.records.len(), "Pushing dirty rows");

        let batch_size = self.options.push_batch_size.max(1);
        for chunk in batch.records.chunks(batch_size) {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                report.interrupted = true;
                break;
            }

            let result = match self.send(tenant, chunk).await {
                Ok(results) => self.settle(tenant, chunk, results, &mut report).await,
                Err(Error::Validation(reason)) if chunk.len() > 1 => {
                    debug!(tenant = %tenant, reason = %reason, "Batch refused, retrying rows one by one");
                    self.push_singly(tenant, chunk, &mut report).await
                }
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                self.stop(tenant, &e, &mut report);
                break;
            }
        }

        if report.pushed > 0 {
            info!(tenant = %tenant, pushed = report.pushed, "Push complete");
        }
        report
    }

    async fn send(&self, tenant: &TenantId, rows: &[LocalRecord]) -> Result<Vec<WriteResult>> {
        let outbound: Vec<OutboundRecord> = rows.iter().map(OutboundRecord::from).collect();
        tokio::time::timeout(self.options.request_timeout, self.remote.write(tenant, &outbound))
            .await
            .map_err(|_| Error::TransientNetwork("write timed out".into()))?
    }

    async fn push_singly(
        &self,
        tenant: &TenantId,
        rows: &[LocalRecord],
        report: &mut SyncReport,
    ) -> Result<()> {
        for row in rows {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Err(Error::Cancelled);
            }
            match self.send(tenant, std::slice::from_ref(row)).await {
                Ok(results) => self.settle(tenant, std::slice::from_ref(row), results, report).await?,
                Err(Error::Validation(reason)) => self.reject(tenant, &row.record.id, &reason, report),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Fold per-row answers back into the local store.
    ///
    /// Rows with no answer stay dirty.
    async fn settle(
        &self,
        tenant: &TenantId,
        sent: &[LocalRecord],
        results: Vec<WriteResult>,
        report: &mut SyncReport,
    ) -> Result<()> {
        let mut by_id: HashMap<String, WriteOutcome> =
            results.into_iter().map(|r| (r.id, r.outcome)).collect();

        for row in sent {
            let id = &row.record.id;
            let Some(outcome) = by_id.remove(id) else {
                debug!(tenant = %tenant, id = %id, "No answer for row, leaving dirty");
                continue;
            };

            match outcome {
                WriteOutcome::Accepted { new_version } => {
                    self.acknowledge(tenant, id, new_version, row.record.version, report);
                }
                WriteOutcome::Rejected { reason } => self.reject(tenant, id, &reason, report),
                WriteOutcome::Conflict { server_record } => {
                    self.settle_conflict(tenant, row, server_record, report).await?;
                }
            }
        }
        Ok(())
    }

    async fn settle_conflict(
        &self,
        tenant: &TenantId,
        row: &LocalRecord,
        server: LedgerRecord,
        report: &mut SyncReport,
    ) -> Result<()> {
        let id = &row.record.id;

        if server.tenant_id != *tenant {
            report.errors.push(
                SyncErrorEvent::new(SyncPhase::Push, &Error::TenantMismatch { id: id.clone() })
                    .for_tenant(tenant)
                    .for_record(id),
            );
            return Ok(());
        }

        // The remote already holds exactly what we sent: an earlier push
        // landed but its acknowledgment was lost.
        if is_same_write(&row.record, &server)? {
            debug!(tenant = %tenant, id = %id, version = server.version, "Replayed acknowledgment");
            self.acknowledge(tenant, id, server.version, row.record.version, report);
            return Ok(());
        }

        report.conflicts += 1;
        match resolve(row.record.version, server.version) {
            Resolution::RemoteWins => {
                debug!(tenant = %tenant, id = %id, local = row.record.version, remote = server.version, "Remote wins push conflict");
                let remote = RemoteRecord {
                    record: server,
                    updated_at: 0,
                };
                let applied = self.store.lock().apply_remote(tenant, &remote);
                if let Err(e) = applied {
                    self.record_local_error(tenant, id, &e, report);
                }
                Ok(())
            }
            Resolution::LocalWins => {
                let rebased = self.store.lock().rebase_local(tenant, id, server.version);
                if let Err(e) = rebased {
                    self.record_local_error(tenant, id, &e, report);
                    return Ok(());
                }
                self.retry_once(tenant, id, report).await
            }
        }
    }

    /// Re-send a row that just won a conflict. A second conflict is settled
    /// by version like the first; a row that still wins stays dirty for the
    /// next cycle.
    async fn retry_once(&self, tenant: &TenantId, id: &str, report: &mut SyncReport) -> Result<()> {
        if self.cancel.is_cancelled() {
            report.cancelled = true;
            return Err(Error::Cancelled);
        }

        let current = self.store.lock().get(tenant, id);
        let row = match current {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(()),
            Err(e) => {
                self.record_local_error(tenant, id, &e, report);
                return Ok(());
            }
        };

        let results = match self.send(tenant, std::slice::from_ref(&row)).await {
            Ok(results) => results,
            Err(Error::Validation(reason)) => {
                self.reject(tenant, id, &reason, report);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match results.into_iter().find(|r| r.id == id).map(|r| r.outcome) {
            Some(WriteOutcome::Accepted { new_version }) => {
                self.acknowledge(tenant, id, new_version, row.record.version, report);
            }
            Some(WriteOutcome::Rejected { reason }) => self.reject(tenant, id, &reason, report),
            Some(WriteOutcome::Conflict { server_record }) => {
                if server_record.tenant_id != *tenant {
                    report.errors.push(
                        SyncErrorEvent::new(SyncPhase::Push, &Error::TenantMismatch { id: id.to_string() })
                            .for_tenant(tenant)
                            .for_record(id),
                    );
                    return Ok(());
                }
                report.conflicts += 1;
                match resolve(row.record.version, server_record.version) {
                    Resolution::RemoteWins => {
                        debug!(tenant = %tenant, id = %id, local = row.record.version, remote = server_record.version, "Remote wins after rebase");
                        let remote = RemoteRecord {
                            record: server_record,
                            updated_at: 0,
                        };
                        let applied = self.store.lock().apply_remote(tenant, &remote);
                        if let Err(e) = applied {
                            self.record_local_error(tenant, id, &e, report);
                        }
                    }
                    Resolution::LocalWins => {
                        debug!(tenant = %tenant, id = %id, local = row.record.version, remote = server_record.version, "Conflict persisted after rebase, row stays dirty");
                    }
                }
            }
            None => {}
        }
        Ok(())
    }

    fn acknowledge(
        &self,
        tenant: &TenantId,
        id: &str,
        accepted_version: i64,
        sent_version: i64,
        report: &mut SyncReport,
    ) {
        let marked = self
            .store
            .lock()
            .mark_synced(tenant, id, accepted_version, Some(sent_version));
        match marked {
            Ok(outcome) => {
                report.pushed += 1;
                if let SyncedOutcome::StillDirty { version } = outcome {
                    debug!(tenant = %tenant, id = %id, version, "Row edited while in flight");
                }
            }
            Err(e) => self.record_local_error(tenant, id, &e, report),
        }
    }

    fn reject(&self, tenant: &TenantId, id: &str, reason: &str, report: &mut SyncReport) {
        warn!(tenant = %tenant, id = %id, reason = %reason, "Remote rejected row");
        let flagged = self.store.lock().mark_sync_error(tenant, id, reason);
        if let Err(e) = flagged {
            self.record_local_error(tenant, id, &e, report);
        }
        report.errors.push(
            SyncErrorEvent::new(SyncPhase::Push, &Error::Validation(reason.to_string()))
                .for_tenant(tenant)
                .for_record(id),
        );
    }

    fn record_local_error(&self, tenant: &TenantId, id: &str, error: &Error, report: &mut SyncReport) {
        warn!(tenant = %tenant, id = %id, error = %error, "Local store write failed during push");
        report.errors.push(
            SyncErrorEvent::new(SyncPhase::Push, error)
                .for_tenant(tenant)
                .for_record(id),
        );
    }

    fn stop(&self, tenant: &TenantId, error: &Error, report: &mut SyncReport) {
        report.interrupted = true;
        if matches!(error, Error::Cancelled) {
            report.cancelled = true;
            return;
        }
        let event = SyncErrorEvent::new(SyncPhase::Push, error).for_tenant(tenant);
        if event.kind == SyncErrorKind::Transient {
            info!(tenant = %tenant, error = %error, "Push stopped, rows stay dirty");
        } else {
            warn!(tenant = %tenant, error = %error, "Push stopped");
        }
        report.errors.push(event);
    }
}
