//! Remote store gateway.
//!
//! The remote store is the canonical multi-tenant copy of the ledger. This
//! crate only talks to it: [`RemoteStore`] is the contract the reconcilers
//! depend on, [`http::HttpRemoteStore`] speaks it over HTTPS and
//! [`memory::InMemoryRemoteStore`] implements the same version check in
//! process.
//!
//! Both calls are safe to retry. A write carries the record's `version` and
//! the `base_version` the client last saw; the remote accepts it only if its
//! own version still equals `base_version`.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{LedgerRecord, LocalRecord, RemoteRecord, TenantId};

pub use http::HttpRemoteStore;
pub use memory::InMemoryRemoteStore;

/// A record as sent by a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRecord {
    #[serde(flatten)]
    pub record: LedgerRecord,

    /// Version the client believes the remote currently holds (0 = new)
    pub base_version: i64,
}

impl From<&LocalRecord> for OutboundRecord {
    fn from(local: &LocalRecord) -> Self {
        Self {
            record: local.record.clone(),
            base_version: local.base_version,
        }
    }
}

/// Per-record answer to a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Stored; the remote now holds `new_version`.
    Accepted { new_version: i64 },
    /// The remote's version did not match `base_version`.
    Conflict { server_record: LedgerRecord },
    /// The record failed the remote's validation.
    Rejected { reason: String },
}

/// Outcome for one id of a write call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub id: String,
    #[serde(flatten)]
    pub outcome: WriteOutcome,
}

/// One page of the change feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    /// Rows with `updated_at > watermark`, ascending by `updated_at`
    pub records: Vec<RemoteRecord>,
    /// More rows are waiting past this page
    #[serde(default)]
    pub has_more: bool,
}

impl ChangeBatch {
    /// Highest `updated_at` in the page, if any.
    #[must_use]
    pub fn max_watermark(&self) -> Option<i64> {
        self.records.iter().map(|r| r.updated_at).max()
    }
}

/// Client-side contract of the remote store.
///
/// Errors: `TransientNetwork` for anything worth retrying later,
/// `Validation` when the whole call was refused, `Unauthorized` when the
/// session is no longer accepted.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Write a batch of records for one tenant.
    ///
    /// Ids missing from the returned list were not written.
    async fn write(&self, tenant: &TenantId, records: &[OutboundRecord]) -> Result<Vec<WriteResult>>;

    /// Read rows changed after `watermark`, at most `limit` of them.
    async fn read_changes_since(
        &self,
        tenant: &TenantId,
        watermark: i64,
        limit: usize,
    ) -> Result<ChangeBatch>;
}
