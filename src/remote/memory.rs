//! In-process remote store.
//!
//! Implements the write contract exactly as the hosted store does (version
//! check against `base_version`, soft-deleted tombstones, strictly
//! increasing `updated_at`) so reconcilers can be exercised end to end
//! without a network. It also counts calls and can be told to misbehave:
//! go offline, lose acknowledgments, stall or refuse whole batches.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use super::{ChangeBatch, OutboundRecord, RemoteStore, WriteOutcome, WriteResult};
use crate::error::{Error, Result};
use crate::model::{LedgerRecord, RemoteRecord, TenantId};

#[derive(Debug, Clone)]
struct StoredRow {
    record: LedgerRecord,
    updated_at: i64,
}

#[derive(Debug, Default)]
struct Inner {
    rows: BTreeMap<(TenantId, String), StoredRow>,
    clock: i64,
    accepted_writes: usize,
    write_calls: usize,
    read_calls: usize,
    offline: bool,
    drop_acks: usize,
    strict_batches: bool,
    rejected_ids: HashSet<String>,
}

impl Inner {
    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }
}

/// Remote store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    inner: Mutex<Inner>,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a row as if another device had written it.
    ///
    /// The record's version is kept as given.
    pub fn put_from_other_device(&self, record: LedgerRecord) -> RemoteRecord {
        let mut inner = self.inner.lock();
        let updated_at = inner.tick();
        let key = (record.tenant_id.clone(), record.id.clone());
        inner.rows.insert(
            key,
            StoredRow {
                record: record.clone(),
                updated_at,
            },
        );
        RemoteRecord { record, updated_at }
    }

    /// Current remote copy of a row, tombstones included.
    #[must_use]
    pub fn get(&self, tenant: &TenantId, id: &str) -> Option<RemoteRecord> {
        self.inner
            .lock()
            .rows
            .get(&(tenant.clone(), id.to_string()))
            .map(|row| RemoteRecord {
                record: row.record.clone(),
                updated_at: row.updated_at,
            })
    }

    /// Number of rows stored for a tenant, tombstones included.
    #[must_use]
    pub fn row_count(&self, tenant: &TenantId) -> usize {
        self.inner
            .lock()
            .rows
            .keys()
            .filter(|(t, _)| t == tenant)
            .count()
    }

    /// Rows actually written (accepted) so far.
    #[must_use]
    pub fn accepted_writes(&self) -> usize {
        self.inner.lock().accepted_writes
    }

    /// Network calls attempted so far, successful or not.
    #[must_use]
    pub fn call_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.write_calls + inner.read_calls
    }

    /// Refuse every call with a transient error while set.
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Apply the next `n` write calls but fail them as if the response was lost.
    pub fn drop_next_acks(&self, n: usize) {
        self.inner.lock().drop_acks = n;
    }

    /// Refuse a whole batch when any row in it is invalid.
    ///
    /// Single-row batches still get a per-row `Rejected`.
    pub fn set_strict_batches(&self, strict: bool) {
        self.inner.lock().strict_batches = strict;
    }

    /// Reject writes of this id as invalid.
    pub fn reject_id(&self, id: &str) {
        self.inner.lock().rejected_ids.insert(id.to_string());
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn validation_error(inner: &Inner, record: &LedgerRecord) -> Option<String> {
    if inner.rejected_ids.contains(&record.id) {
        return Some(format!("record {} refused by server rules", record.id));
    }
    if record.amount_minor_units < 0 {
        return Some("amount must not be negative".to_string());
    }
    if record.description.len() > 500 {
        return Some("description longer than 500 bytes".to_string());
    }
    None
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn write(&self, tenant: &TenantId, records: &[OutboundRecord]) -> Result<Vec<WriteResult>> {
        self.simulate_latency().await;

        let mut inner = self.inner.lock();
        inner.write_calls += 1;
        if inner.offline {
            return Err(Error::TransientNetwork("remote unreachable".into()));
        }

        if inner.strict_batches && records.len() > 1 {
            if let Some(reason) = records.iter().find_map(|r| validation_error(&inner, &r.record)) {
                return Err(Error::Validation(format!("batch refused: {reason}")));
            }
        }

        let mut results = Vec::with_capacity(records.len());
        for outbound in records {
            let record = &outbound.record;
            let outcome = if record.tenant_id != *tenant {
                WriteOutcome::Rejected {
                    reason: "record belongs to another tenant".into(),
                }
            } else if let Some(reason) = validation_error(&inner, record) {
                WriteOutcome::Rejected { reason }
            } else {
                let key = (tenant.clone(), record.id.clone());
                match inner.rows.get(&key) {
                    Some(current) if current.record.version != outbound.base_version => {
                        WriteOutcome::Conflict {
                            server_record: current.record.clone(),
                        }
                    }
                    _ => {
                        let updated_at = inner.tick();
                        inner.rows.insert(
                            key,
                            StoredRow {
                                record: record.clone(),
                                updated_at,
                            },
                        );
                        inner.accepted_writes += 1;
                        WriteOutcome::Accepted {
                            new_version: record.version,
                        }
                    }
                }
            };
            results.push(WriteResult {
                id: record.id.clone(),
                outcome,
            });
        }

        if inner.drop_acks > 0 {
            inner.drop_acks -= 1;
            return Err(Error::TransientNetwork(
                "connection reset before response".into(),
            ));
        }
        Ok(results)
    }

    async fn read_changes_since(
        &self,
        tenant: &TenantId,
        watermark: i64,
        limit: usize,
    ) -> Result<ChangeBatch> {
        self.simulate_latency().await;

        let mut inner = self.inner.lock();
        inner.read_calls += 1;
        if inner.offline {
            return Err(Error::TransientNetwork("remote unreachable".into()));
        }

        let mut changed: Vec<RemoteRecord> = inner
            .rows
            .iter()
            .filter(|((t, _), row)| t == tenant && row.updated_at > watermark)
            .map(|(_, row)| RemoteRecord {
                record: row.record.clone(),
                updated_at: row.updated_at,
            })
            .collect();
        changed.sort_by_key(|r| r.updated_at);

        let has_more = changed.len() > limit;
        changed.truncate(limit);
        Ok(ChangeBatch {
            records: changed,
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordKind;
    use chrono::NaiveDate;

    fn tenant() -> TenantId {
        TenantId::parse("7d444840-9dc0-11d1-b245-5ffdce74fad2").unwrap()
    }

    fn outbound(id: &str, version: i64, base_version: i64) -> OutboundRecord {
        OutboundRecord {
            record: LedgerRecord {
                id: id.into(),
                tenant_id: tenant(),
                kind: RecordKind::Income,
                date: NaiveDate::from_ymd_opt(2026, 5, 5).unwrap(),
                amount_minor_units: 100,
                description: "sale".into(),
                version,
                deleted: false,
                schema_version: 1,
            },
            base_version,
        }
    }

    #[tokio::test]
    async fn test_version_check() {
        let remote = InMemoryRemoteStore::new();
        let t = tenant();

        let results = remote.write(&t, &[outbound("r1", 1, 0)]).await.unwrap();
        assert_eq!(results[0].outcome, WriteOutcome::Accepted { new_version: 1 });

        // Stale base
        let results = remote.write(&t, &[outbound("r1", 2, 0)]).await.unwrap();
        assert!(matches!(results[0].outcome, WriteOutcome::Conflict { .. }));

        let results = remote.write(&t, &[outbound("r1", 2, 1)]).await.unwrap();
        assert_eq!(results[0].outcome, WriteOutcome::Accepted { new_version: 2 });
        assert_eq!(remote.accepted_writes(), 2);
    }

    #[tokio::test]
    async fn test_change_feed_pages() {
        let remote = InMemoryRemoteStore::new();
        let t = tenant();
        for i in 0..5 {
            remote.write(&t, &[outbound(&format!("r{i}"), 1, 0)]).await.unwrap();
        }

        let page = remote.read_changes_since(&t, 0, 2).await.unwrap();
        assert_eq!(page.records.len(), 2);
        assert!(page.has_more);

        let next = remote
            .read_changes_since(&t, page.max_watermark().unwrap(), 10)
            .await
            .unwrap();
        assert_eq!(next.records.len(), 3);
        assert!(!next.has_more);
    }

    #[tokio::test]
    async fn test_dropped_ack_still_writes() {
        let remote = InMemoryRemoteStore::new();
        let t = tenant();
        remote.drop_next_acks(1);

        let err = remote.write(&t, &[outbound("r1", 1, 0)]).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(remote.get(&t, "r1").unwrap().record.version, 1);
    }

    #[tokio::test]
    async fn test_strict_batches_refuse_whole_call() {
        let remote = InMemoryRemoteStore::new();
        let t = tenant();
        remote.set_strict_batches(true);
        remote.reject_id("bad");

        let err = remote
            .write(&t, &[outbound("good", 1, 0), outbound("bad", 1, 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(remote.row_count(&t), 0);

        let results = remote.write(&t, &[outbound("bad", 1, 0)]).await.unwrap();
        assert!(matches!(results[0].outcome, WriteOutcome::Rejected { .. }));
    }
}
