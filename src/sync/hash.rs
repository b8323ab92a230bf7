//! Content hashing for push acknowledgment replay detection.
//!
//! When a push comes back as a conflict, the remote may simply be holding
//! our own earlier write whose acknowledgment never arrived. Comparing a
//! SHA256 of the user-visible content (plus the version, compared
//! separately) tells the two cases apart without a field-by-field diff.

use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::model::{LedgerRecord, RecordKind};

/// The fields that make two writes of a record "the same write".
#[derive(Serialize)]
struct RecordContent<'a> {
    id: &'a str,
    tenant_id: &'a str,
    kind: RecordKind,
    date: NaiveDate,
    amount_minor_units: i64,
    description: &'a str,
    deleted: bool,
}

/// Compute a SHA256 hash of a serializable value.
///
/// The value is serialized to JSON first, so field order is the struct's
/// declaration order and the hash is deterministic.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash the user-visible content of a ledger record.
///
/// Versions and bookkeeping are excluded.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn record_hash(record: &LedgerRecord) -> Result<String> {
    content_hash(&RecordContent {
        id: &record.id,
        tenant_id: record.tenant_id.as_str(),
        kind: record.kind,
        date: record.date,
        amount_minor_units: record.amount_minor_units,
        description: &record.description,
        deleted: record.deleted,
    })
}

/// Whether the remote copy is exactly the write we sent.
///
/// # Errors
///
/// Returns an error if either record cannot be hashed.
pub fn is_same_write(local: &LedgerRecord, remote: &LedgerRecord) -> Result<bool> {
    Ok(local.version == remote.version && record_hash(local)? == record_hash(remote)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TenantId;

    fn record() -> LedgerRecord {
        LedgerRecord {
            id: "rec-1".into(),
            tenant_id: TenantId::parse("7d444840-9dc0-11d1-b245-5ffdce74fad2").unwrap(),
            kind: RecordKind::Expense,
            date: NaiveDate::from_ymd_opt(2026, 2, 14).unwrap(),
            amount_minor_units: 4_200,
            description: "Flowers".into(),
            version: 2,
            deleted: false,
            schema_version: 1,
        }
    }

    #[test]
    fn test_content_hash_deterministic() {
        let hash1 = record_hash(&record()).unwrap();
        let hash2 = record_hash(&record()).unwrap();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_hash_ignores_version() {
        let mut bumped = record();
        bumped.version = 9;
        assert_eq!(record_hash(&record()).unwrap(), record_hash(&bumped).unwrap());
    }

    #[test]
    fn test_same_write_needs_version_and_content() {
        let local = record();

        let mut remote = record();
        assert!(is_same_write(&local, &remote).unwrap());

        remote.amount_minor_units = 4_300;
        assert!(!is_same_write(&local, &remote).unwrap());

        let mut remote = record();
        remote.version = 3;
        assert!(!is_same_write(&local, &remote).unwrap());
    }
}
