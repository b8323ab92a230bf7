//! Error types for the ledger sync engine.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags so the sync cycle knows what to back off on
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ledger sync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,
    LocalStoreCorruption,

    // Not Found (exit 3)
    RecordNotFound,
    NoTenantResolved,

    // Validation (exit 4)
    InvalidArgument,
    ValidationError,
    TenantMismatch,

    // Sync (exit 6)
    TransientNetwork,
    ConflictError,
    Unauthorized,
    Cancelled,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::LocalStoreCorruption => "LOCAL_STORE_CORRUPTION",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::NoTenantResolved => "NO_TENANT_RESOLVED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::TenantMismatch => "TENANT_MISMATCH",
            Self::TransientNetwork => "TRANSIENT_NETWORK",
            Self::ConflictError => "CONFLICT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Cancelled => "CANCELLED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::DatabaseError
            | Self::LocalStoreCorruption => 2,
            Self::RecordNotFound | Self::NoTenantResolved => 3,
            Self::InvalidArgument | Self::ValidationError | Self::TenantMismatch => 4,
            Self::TransientNetwork | Self::ConflictError | Self::Unauthorized | Self::Cancelled => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the operation may succeed if simply tried again later.
    ///
    /// True for network trouble, lost races and busy databases. Validation
    /// failures and a missing tenant need someone to act first.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientNetwork | Self::ConflictError | Self::Cancelled | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in ledger sync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `ledger-sync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Record not found: {id}")]
    NotFound { id: String },

    #[error("No tenant resolved for the current session")]
    NoTenantResolved,

    #[error("Record {id} belongs to another tenant")]
    TenantMismatch { id: String },

    #[error("Network error: {0}")]
    TransientNetwork(String),

    #[error("Version conflict on {id}: local {local_version}, remote {remote_version}")]
    Conflict {
        id: String,
        local_version: i64,
        remote_version: i64,
    },

    #[error("Rejected by remote store: {0}")]
    Validation(String),

    #[error("Remote store refused the session: {0}")]
    Unauthorized(String),

    #[error("Local store corruption on {id}: {reason}")]
    LocalStoreCorruption { id: String, reason: String },

    #[error("Sync cycle cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::LocalStoreCorruption { .. } => ErrorCode::LocalStoreCorruption,
            Self::NotFound { .. } => ErrorCode::RecordNotFound,
            Self::NoTenantResolved => ErrorCode::NoTenantResolved,
            Self::TenantMismatch { .. } => ErrorCode::TenantMismatch,
            Self::TransientNetwork(_) => ErrorCode::TransientNetwork,
            Self::Conflict { .. } => ErrorCode::ConflictError,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Whether this error should leave rows dirty for a later retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `ledger-sync init` to create the local database".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::NoTenantResolved => Some(
                "No company is bound to this device.\n  \
                 Set one:  ledger-sync tenant set <company-id>\n  \
                 Or sign in with a token so the remote lookup can resolve it"
                    .to_string(),
            ),

            Self::NotFound { id } => Some(format!(
                "No record with ID '{id}'. Use `ledger-sync list` to see local records."
            )),

            Self::TransientNetwork(_) => Some(
                "Changes are kept locally and will be pushed on the next sync.".to_string(),
            ),

            Self::Validation(_) => Some(
                "Edit the record or run `ledger-sync retry <id>` once it is fixed.".to_string(),
            ),

            Self::Unauthorized(_) => {
                Some("Sign in again (set LEDGER_SYNC_TOKEN) and retry.".to_string())
            }

            Self::InvalidArgument(msg) => {
                if msg.contains("kind") {
                    Some(
                        "Valid kinds: income, expense. \
                         Synonyms: revenue/credit→income, cost/debit→expense"
                            .to_string(),
                    )
                } else if msg.contains("amount") {
                    Some("Amounts are positive, e.g. 15, 15.5 or 15.00".to_string())
                } else {
                    None
                }
            }

            Self::TenantMismatch { .. }
            | Self::Conflict { .. }
            | Self::LocalStoreCorruption { .. }
            | Self::Cancelled
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_are_retryable() {
        let err = Error::TransientNetwork("connection reset".into());
        assert!(err.is_transient());
        assert!(err.error_code().is_retryable());
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_validation_is_not_retryable() {
        let err = Error::Validation("amount must be positive".into());
        assert!(!err.is_transient());
        assert!(!err.error_code().is_retryable());
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let json = Error::NoTenantResolved.to_structured_json();
        assert_eq!(json["error"]["code"], "NO_TENANT_RESOLVED");
        assert_eq!(json["error"]["exit_code"], 3);
        assert!(json["error"]["hint"].as_str().unwrap().contains("tenant set"));
    }
}
