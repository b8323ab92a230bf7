//! Tenant (company) identifiers.
//!
//! Every local row and every remote call is scoped by a `TenantId`. The
//! remote store uses hyphenated UUIDs for companies, so anything else
//! (empty, truncated, garbage from a stale storage slot) cannot be
//! turned into a `TenantId` at all.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a hyphenated UUID, the remote store's company id format.
pub const TENANT_ID_LEN: usize = 36;

/// A validated tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parse a raw identifier, returning `None` if it is malformed.
    ///
    /// Surrounding whitespace and quotes (left behind by some storage
    /// layers that JSON-encode strings) are stripped first. The value is
    /// normalized to lowercase.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_matches('"').trim();
        if trimmed.len() != TENANT_ID_LEN {
            return None;
        }
        uuid::Uuid::parse_str(trimmed)
            .ok()
            .map(|u| Self(u.hyphenated().to_string()))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("Malformed tenant id: {value}"))
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl std::str::FromStr for TenantId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Malformed tenant id: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPANY: &str = "7d444840-9dc0-11d1-b245-5ffdce74fad2";

    #[test]
    fn test_parse_valid_uuid() {
        let id = TenantId::parse(COMPANY).unwrap();
        assert_eq!(id.as_str(), COMPANY);
    }

    #[test]
    fn test_parse_normalizes_case_and_quotes() {
        let id = TenantId::parse("  \"7D444840-9DC0-11D1-B245-5FFDCE74FAD2\" ").unwrap();
        assert_eq!(id.as_str(), COMPANY);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TenantId::parse("").is_none());
        assert!(TenantId::parse("   ").is_none());
        assert!(TenantId::parse("null").is_none());
        assert!(TenantId::parse("7d444840-9dc0").is_none());
        // Simple (unhyphenated) form is a different length
        assert!(TenantId::parse("7d4448409dc011d1b2455ffdce74fad2").is_none());
        assert!(TenantId::parse("zzzzzzzz-9dc0-11d1-b245-5ffdce74fad2").is_none());
    }

    #[test]
    fn test_serde_rejects_malformed() {
        let ok: TenantId = serde_json::from_str(&format!("\"{COMPANY}\"")).unwrap();
        assert_eq!(ok.as_str(), COMPANY);
        assert!(serde_json::from_str::<TenantId>("\"abc\"").is_err());
    }
}
