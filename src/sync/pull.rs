//! Pull reconciler: remote change feed into the local mirror.
//!
//! Pages are read from the tenant's cursor forward. Each page is merged
//! and the cursor advanced in one local transaction, so a crash between
//! pages replays at most one page, and replaying is harmless because
//! stale rows are ignored by version.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::types::{SyncErrorEvent, SyncOptions, SyncPhase, SyncReport};
use super::SharedStore;
use crate::error::{Error, Result};
use crate::model::TenantId;
use crate::remote::{ChangeBatch, RemoteStore};
use crate::storage::ApplyOutcome;

/// Pulls one tenant's remote changes.
pub struct PullReconciler<'a> {
    store: &'a SharedStore,
    remote: &'a dyn RemoteStore,
    options: &'a SyncOptions,
    cancel: &'a CancellationToken,
}

impl<'a> PullReconciler<'a> {
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

    /// Pull every change past the tenant's cursor.
    ///
    /// Never fails: problems are collected in the report. Pages merged
    /// before a failure stay merged.
    pub async fn pull_remote(&self, tenant: &TenantId) -> SyncReport {
        let mut report = SyncReport::default();
        let page_size = self.options.pull_page_size.max(1);

        loop {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                report.interrupted = true;
                break;
            }

            let cursor = self.store.lock().cursor(tenant);
            let cursor = match cursor {
                Ok(cursor) => cursor,
                Err(e) => {
                    self.stop(tenant, &e, &mut report);
                    break;
                }
            };

            let page = match self.read_page(tenant, cursor, page_size).await {
                Ok(page) => page,
                Err(e) => {
                    self.stop(tenant, &e, &mut report);
                    break;
                }
            };

            let Some(watermark) = page.max_watermark() else {
                break;
            };
            debug!(tenant = %tenant, cursor, rows = page.records.len(), "Merging change page");

            let merged = self
                .store
                .lock()
                .apply_remote_batch(tenant, &page.records, watermark);
            let applied = match merged {
                Ok(applied) => applied,
                Err(e) => {
                    self.stop(tenant, &e, &mut report);
                    break;
                }
            };

            for (id, outcome) in &applied.outcomes {
                if outcome.changed_local() {
                    report.pulled += 1;
                }
                if outcome.is_conflict() {
                    report.conflicts += 1;
                }
                if *outcome == ApplyOutcome::ForeignTenant {
                    report.errors.push(
                        SyncErrorEvent::new(SyncPhase::Pull, &Error::TenantMismatch { id: id.clone() })
                            .for_tenant(tenant)
                            .for_record(id),
                    );
                }
            }

            if !page.has_more {
                break;
            }
            if applied.cursor <= cursor {
                warn!(tenant = %tenant, cursor, "Change feed did not advance, stopping");
                break;
            }
        }

        if report.pulled > 0 {
            info!(tenant = %tenant, pulled = report.pulled, "Pull complete");
        }
        report
    }

    async fn read_page(&self, tenant: &TenantId, cursor: i64, limit: usize) -> Result<ChangeBatch> {
        tokio::time::timeout(
            self.options.request_timeout,
            self.remote.read_changes_since(tenant, cursor, limit),
        )
        .await
        .map_err(|_| Error::TransientNetwork("change feed read timed out".into()))?
    }

    fn stop(&self, tenant: &TenantId, error: &Error, report: &mut SyncReport) {
        report.interrupted = true;
        debug!(tenant = %tenant, error = %error, "Pull stopped");
        report
            .errors
            .push(SyncErrorEvent::new(SyncPhase::Pull, error).for_tenant(tenant));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LedgerRecord, RecordKind, RemoteRecord, RECORD_SCHEMA_VERSION};
    use crate::remote::{InMemoryRemoteStore, OutboundRecord, WriteResult};
    use crate::storage::LocalStore;
    use crate::sync::types::SyncErrorKind;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use std::sync::Arc;

    const TENANT_A: &str = "7d444840-9dc0-11d1-b245-5ffdce74fad2";
    const TENANT_B: &str = "0b5a57b8-3a8f-4b9e-9d0c-1b2f1e0c6a11";

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    fn record(tenant_id: &str, id: &str, version: i64) -> LedgerRecord {
        LedgerRecord {
            id: id.to_string(),
            tenant_id: tenant(tenant_id),
            kind: RecordKind::Income,
            date: NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
            amount_minor_units: 2_500,
            description: format!("invoice {id}"),
            version,
            deleted: false,
            schema_version: RECORD_SCHEMA_VERSION,
        }
    }

    fn shared_store() -> SharedStore {
        Arc::new(Mutex::new(LocalStore::open_memory().unwrap()))
    }

    /// Serves a fixed change feed regardless of the watermark.
    struct ScriptedFeed(Vec<RemoteRecord>);

    #[async_trait]
    impl RemoteStore for ScriptedFeed {
        async fn write(&self, _tenant: &TenantId, _records: &[OutboundRecord]) -> Result<Vec<WriteResult>> {
            Ok(Vec::new())
        }

        async fn read_changes_since(
            &self,
            _tenant: &TenantId,
            watermark: i64,
            _limit: usize,
        ) -> Result<ChangeBatch> {
            Ok(ChangeBatch {
                records: self
                    .0
                    .iter()
                    .filter(|r| r.updated_at > watermark)
                    .cloned()
                    .collect(),
                has_more: false,
            })
        }
    }

    #[tokio::test]
    async fn test_pages_until_caught_up() {
        let store = shared_store();
        let remote = InMemoryRemoteStore::new();
        for i in 0..5 {
            remote.put_from_other_device(record(TENANT_A, &format!("r{i}"), 1));
        }
        let options = SyncOptions {
            pull_page_size: 2,
            ..SyncOptions::default()
        };
        let cancel = CancellationToken::new();
        let t = tenant(TENANT_A);

        let report = PullReconciler::new(&store, &remote, &options, &cancel)
            .pull_remote(&t)
            .await;
        assert_eq!(report.pulled, 5);
        assert!(report.errors.is_empty());
        assert_eq!(remote.call_count(), 3);
        assert_eq!(store.lock().cursor(&t).unwrap(), 5);

        // Caught up: one empty read, nothing applied
        let report = PullReconciler::new(&store, &remote, &options, &cancel)
            .pull_remote(&t)
            .await;
        assert_eq!(report.pulled, 0);
        assert_eq!(store.lock().cursor(&t).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_stale_remote_row_ignored_for_newer_dirty_edit() {
        let store = shared_store();
        let t = tenant(TENANT_A);
        let mut local = record(TENANT_A, "r1", 0);
        store.lock().upsert_local(&local).unwrap();
        local.description = "edited offline".into();
        let edited = store.lock().upsert_local(&local).unwrap();
        assert_eq!(edited.record.version, 2);

        let remote = InMemoryRemoteStore::new();
        remote.put_from_other_device(record(TENANT_A, "r1", 1));
        let options = SyncOptions::default();
        let cancel = CancellationToken::new();

        let report = PullReconciler::new(&store, &remote, &options, &cancel)
            .pull_remote(&t)
            .await;
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.pulled, 0);

        let after = store.lock().get(&t, "r1").unwrap().unwrap();
        assert!(after.dirty);
        assert_eq!(after.record.version, 2);
        assert_eq!(after.record.description, "edited offline");
    }

    #[tokio::test]
    async fn test_failed_page_leaves_cursor_and_rows_alone() {
        let store = shared_store();
        let t = tenant(TENANT_A);
        store
            .lock()
            .conn()
            .execute_batch(
                "CREATE TRIGGER poison BEFORE INSERT ON transactions_local
                 WHEN NEW.id = 'poison'
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let remote = InMemoryRemoteStore::new();
        remote.put_from_other_device(record(TENANT_A, "good", 1));
        remote.put_from_other_device(record(TENANT_A, "poison", 1));
        let options = SyncOptions::default();
        let cancel = CancellationToken::new();

        let report = PullReconciler::new(&store, &remote, &options, &cancel)
            .pull_remote(&t)
            .await;
        assert!(report.interrupted);
        assert_eq!(report.errors[0].kind, SyncErrorKind::Storage);
        assert_eq!(store.lock().cursor(&t).unwrap(), 0);
        assert!(store.lock().get(&t, "good").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_foreign_rows_reported_not_applied() {
        let store = shared_store();
        let t = tenant(TENANT_A);
        let feed = ScriptedFeed(vec![
            RemoteRecord {
                record: record(TENANT_A, "mine", 1),
                updated_at: 10,
            },
            RemoteRecord {
                record: record(TENANT_B, "theirs", 1),
                updated_at: 11,
            },
        ]);
        let options = SyncOptions::default();
        let cancel = CancellationToken::new();

        let report = PullReconciler::new(&store, &feed, &options, &cancel)
            .pull_remote(&t)
            .await;
        assert_eq!(report.pulled, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, SyncErrorKind::TenantMismatch);
        assert!(store.lock().get(&tenant(TENANT_B), "theirs").unwrap().is_none());
        assert_eq!(store.lock().cursor(&t).unwrap(), 11);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_page() {
        let store = shared_store();
        let remote = InMemoryRemoteStore::new();
        remote.put_from_other_device(record(TENANT_A, "r1", 1));
        let options = SyncOptions::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = PullReconciler::new(&store, &remote, &options, &cancel)
            .pull_remote(&tenant(TENANT_A))
            .await;
        assert!(report.cancelled);
        assert_eq!(remote.call_count(), 0);
    }
}
