//! Command implementations.

pub mod completions;
pub mod delete;
pub mod history;
pub mod init;
pub mod list;
pub mod record;
pub mod retry;
pub mod status;
pub mod sync;
pub mod tenant;
pub mod version;
pub mod watch;

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::{resolve_data_dir, resolve_db_path, resolve_token, SyncConfig};
use crate::error::{Error, Result};
use crate::model::TenantId;
use crate::remote::{HttpRemoteStore, RemoteStore};
use crate::storage::LocalStore;
use crate::sync::SyncEngine;
use crate::tenant::{AuthSession, IdentityLookup, TenantResolver};

/// User id attached to sessions built from `LEDGER_SYNC_TOKEN`.
const CLI_USER: &str = "cli";

/// Paths and config every command starts from.
pub struct Workspace {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub config: SyncConfig,
}

impl Workspace {
    /// Locate the data directory and database and load `config.json`.
    ///
    /// # Errors
    ///
    /// `Config` when no data directory can be determined or the config
    /// file is invalid.
    pub fn locate(db: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let data_dir = resolve_data_dir(data_dir)
            .ok_or_else(|| Error::Config("Could not determine a data directory".to_string()))?;
        let db_path = resolve_db_path(db, &data_dir);
        let config = SyncConfig::load(&data_dir)?;
        debug!(data_dir = %data_dir.display(), db = %db_path.display(), "Workspace located");
        Ok(Self {
            data_dir,
            db_path,
            config,
        })
    }

    /// Open the local store. The database must already exist.
    ///
    /// # Errors
    ///
    /// `NotInitialized` if `init` has not been run.
    pub fn open_store(&self) -> Result<LocalStore> {
        if !self.db_path.exists() {
            return Err(Error::NotInitialized);
        }
        LocalStore::open(&self.db_path)
    }

    /// Session built from `LEDGER_SYNC_TOKEN`, if set.
    #[must_use]
    pub fn session(&self) -> Option<AuthSession> {
        resolve_token().map(|token| AuthSession::new(CLI_USER, token))
    }

    /// HTTP gateway to the configured remote store.
    ///
    /// # Errors
    ///
    /// `Config` when no remote URL is configured.
    pub fn remote(&self) -> Result<Arc<HttpRemoteStore>> {
        let url = self.config.remote_url().ok_or_else(|| {
            Error::Config(
                "No remote store configured; run `ledger-sync init --remote-url <url>` \
                 or set LEDGER_SYNC_REMOTE_URL"
                    .to_string(),
            )
        })?;
        let options = self.config.sync_options()?;
        let remote = HttpRemoteStore::new(&url, resolve_token(), options.request_timeout)?;
        Ok(Arc::new(remote))
    }

    /// Tenant resolver over the stored ids, plus the remote lookup when a
    /// remote and a token are both available.
    #[must_use]
    pub fn resolver(&self) -> TenantResolver {
        let lookup = match (self.config.remote_url(), resolve_token()) {
            (Some(_), Some(_)) => self
                .remote()
                .ok()
                .map(|remote| remote as Arc<dyn IdentityLookup>),
            _ => None,
        };
        TenantResolver::standard(&self.data_dir, lookup)
    }

    /// Resolve the tenant for local-only commands.
    ///
    /// # Errors
    ///
    /// `NoTenantResolved` when no company is bound to this device.
    pub fn tenant(&self) -> Result<TenantId> {
        let resolver = self.resolver();
        let session = self.session();
        runtime()?.block_on(resolver.resolve_tenant_id(session.as_ref()))
    }

    /// Engine wired to the local store and the HTTP remote.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, or `Config` without a remote URL.
    pub fn engine(&self) -> Result<SyncEngine> {
        let store = Arc::new(Mutex::new(self.open_store()?));
        let remote = self.remote()?;
        let resolver = Arc::new(self.resolver());
        let engine = SyncEngine::new(
            store,
            remote as Arc<dyn RemoteStore>,
            resolver,
            self.config.sync_options()?,
        );
        if let Some(session) = self.session() {
            engine.login(session);
        }
        Ok(engine)
    }
}

/// Tokio runtime for commands that do async work.
///
/// # Errors
///
/// Returns an error if the runtime cannot be started.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to start async runtime: {e}")))
}

/// `NotFound` for `id`, pointing at near matches when there are any.
pub(crate) fn not_found(store: &LocalStore, tenant: &TenantId, id: &str) -> Error {
    let existing: Vec<String> = store
        .list(tenant, true)
        .map(|rows| rows.into_iter().map(|r| r.record.id).collect())
        .unwrap_or_default();
    let similar = crate::validate::find_similar_ids(id, &existing, 3);
    if similar.is_empty() {
        Error::NotFound { id: id.to_string() }
    } else {
        Error::NotFound {
            id: format!("{id} (did you mean: {}?)", similar.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::locate(None, Some(dir.path())).unwrap();
        assert!(matches!(ws.open_store(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_remote_requires_url() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace {
            data_dir: dir.path().to_path_buf(),
            db_path: dir.path().join("ledger.db"),
            config: SyncConfig::default(),
        };
        // Only meaningful when the environment does not supply a URL
        if ws.config.remote_url().is_none() {
            assert!(matches!(ws.remote(), Err(Error::Config(_))));
        }
    }
}
