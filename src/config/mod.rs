//! Configuration management.
//!
//! Everything lives in one per-user data directory:
//!
//! - `ledger.db` - the local SQLite mirror
//! - `config.json` - remote URL and sync tunables
//! - `company_id` / `local_storage.json` - stored tenant identity
//!
//! Precedence for every setting is explicit flag, then environment, then
//! `config.json`, then built-in defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::sync::SyncOptions;
use crate::tenant::sources::write_private;

/// Database file name inside the data directory.
pub const DB_FILE: &str = "ledger.db";

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

pub const ENV_DB: &str = "LEDGER_SYNC_DB";
pub const ENV_DATA_DIR: &str = "LEDGER_SYNC_DATA_DIR";
pub const ENV_REMOTE_URL: &str = "LEDGER_SYNC_REMOTE_URL";
pub const ENV_TOKEN: &str = "LEDGER_SYNC_TOKEN";

/// Platform data directory, e.g. `~/.local/share/ledger-sync`.
#[must_use]
pub fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "ledger-sync").map(|d| d.data_dir().to_path_buf())
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the data directory.
///
/// Priority:
/// 1. `--data-dir` flag
/// 2. `LEDGER_SYNC_DATA_DIR` environment variable
/// 3. Platform data directory
#[must_use]
pub fn resolve_data_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    pick_data_dir(explicit, env_value(ENV_DATA_DIR), default_data_dir())
}

fn pick_data_dir(
    explicit: Option<&Path>,
    env: Option<String>,
    default: Option<PathBuf>,
) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env.map(PathBuf::from))
        .or(default)
}

/// Resolve the database path.
///
/// Priority:
/// 1. `--db` flag
/// 2. `LEDGER_SYNC_DB` environment variable
/// 3. `ledger.db` inside the data directory
#[must_use]
pub fn resolve_db_path(explicit: Option<&Path>, data_dir: &Path) -> PathBuf {
    pick_db_path(explicit, env_value(ENV_DB), data_dir)
}

fn pick_db_path(explicit: Option<&Path>, env: Option<String>, data_dir: &Path) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env.map(PathBuf::from))
        .unwrap_or_else(|| data_dir.join(DB_FILE))
}

/// Bearer token for the remote store, from the environment only.
#[must_use]
pub fn resolve_token() -> Option<String> {
    env_value(ENV_TOKEN)
}

/// Contents of `config.json`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_page_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_base_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_factor: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_cap_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_grace_secs: Option<u64>,
}

impl SyncConfig {
    /// Load `config.json` from the data directory. A missing file is an
    /// empty config.
    ///
    /// # Errors
    ///
    /// `Config` if the file exists but is not valid JSON for this shape.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Write `config.json` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_private(&data_dir.join(CONFIG_FILE), json.as_bytes())?;
        Ok(())
    }

    /// Remote URL: environment first, then the file.
    #[must_use]
    pub fn remote_url(&self) -> Option<String> {
        env_value(ENV_REMOTE_URL).or_else(|| self.remote_url.clone())
    }

    /// Tunables with defaults filled in.
    ///
    /// # Errors
    ///
    /// `Config` for zero sizes, a zero timeout or a cap below the base.
    pub fn sync_options(&self) -> Result<SyncOptions> {
        let defaults = SyncOptions::default();
        let secs = |v: Option<u64>, d: Duration| v.map_or(d, Duration::from_secs);

        let options = SyncOptions {
            push_batch_size: self.push_batch_size.unwrap_or(defaults.push_batch_size),
            pull_page_size: self.pull_page_size.unwrap_or(defaults.pull_page_size),
            request_timeout: secs(self.request_timeout_secs, defaults.request_timeout),
            backoff_base: secs(self.backoff_base_secs, defaults.backoff_base),
            backoff_factor: self.backoff_factor.unwrap_or(defaults.backoff_factor),
            backoff_cap: secs(self.backoff_cap_secs, defaults.backoff_cap),
            interval: secs(self.interval_secs, defaults.interval),
            background_grace: secs(self.background_grace_secs, defaults.background_grace),
        };

        if options.push_batch_size == 0 || options.pull_page_size == 0 {
            return Err(Error::Config("batch sizes must be at least 1".into()));
        }
        if options.request_timeout.is_zero() || options.interval.is_zero() {
            return Err(Error::Config("timeouts and intervals must be positive".into()));
        }
        if options.backoff_factor == 0 || options.backoff_cap < options.backoff_base {
            return Err(Error::Config(
                "backoff factor must be positive and the cap at least the base".into(),
            ));
        }
        Ok(options)
    }
}
