//! Company (tenant) resolution.
//!
//! Every sync cycle is scoped to exactly one tenant. [`TenantResolver`]
//! decides which one by polling an ordered chain of [`IdentitySource`]s
//! and taking the first well-formed identifier. Malformed values and
//! failing sources count as absent; if nothing resolves, the caller gets
//! `NoTenantResolved` and must not touch the network or the local store.

pub mod sources;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::TenantId;

pub use sources::{LocalStorageSource, RemoteLookupSource, SecureStorageSource};

/// An authenticated session as handed over by the sign-in flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: String,
    pub token: String,
}

impl AuthSession {
    #[must_use]
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

/// Backend call answering "which company does this session belong to".
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Raw company id for the session, `None` if the backend has none.
    async fn company_for_session(&self, session: &AuthSession) -> Result<Option<String>>;
}

/// One place a tenant id may be stored or discovered.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Raw, unvalidated value held by this source.
    async fn read(&self, session: Option<&AuthSession>) -> Result<Option<String>>;

    /// Persist a resolved id. Read-only sources ignore this.
    fn remember(&self, _tenant: &TenantId) -> Result<()> {
        Ok(())
    }

    /// Drop any stored id.
    fn forget(&self) -> Result<()> {
        Ok(())
    }
}

/// Resolves and caches the active tenant.
pub struct TenantResolver {
    sources: Vec<Box<dyn IdentitySource>>,
    cached: Mutex<Option<TenantId>>,
}

impl TenantResolver {
    /// Build a resolver polling `sources` in the given order.
    #[must_use]
    pub fn new(sources: Vec<Box<dyn IdentitySource>>) -> Self {
        Self {
            sources,
            cached: Mutex::new(None),
        }
    }

    /// The standard chain: secure storage, local storage, then the remote
    /// lookup when one is available.
    #[must_use]
    pub fn standard(data_dir: &Path, lookup: Option<Arc<dyn IdentityLookup>>) -> Self {
        let mut sources: Vec<Box<dyn IdentitySource>> = vec![
            Box::new(SecureStorageSource::new(data_dir)),
            Box::new(LocalStorageSource::new(data_dir)),
        ];
        if let Some(lookup) = lookup {
            sources.push(Box::new(RemoteLookupSource::new(lookup)));
        }
        Self::new(sources)
    }

    /// Resolve the tenant for `session`.
    ///
    /// The first source yielding a well-formed id wins; earlier sources
    /// are back-filled with it so the next offline start resolves locally.
    /// The result is cached until [`invalidate`](Self::invalidate).
    ///
    /// # Errors
    ///
    /// `NoTenantResolved` when no source yields a usable id.
    pub async fn resolve_tenant_id(&self, session: Option<&AuthSession>) -> Result<TenantId> {
        let cached = self.cached.lock().clone();
        if let Some(tenant) = cached {
            return Ok(tenant);
        }

        for (index, source) in self.sources.iter().enumerate() {
            let raw = match source.read(session).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Identity source failed, skipping");
                    continue;
                }
            };

            let Some(tenant) = TenantId::parse(&raw) else {
                warn!(source = source.name(), len = raw.len(), "Ignoring malformed company id");
                continue;
            };

            debug!(source = source.name(), tenant = %tenant, "Tenant resolved");
            for earlier in &self.sources[..index] {
                if let Err(e) = earlier.remember(&tenant) {
                    warn!(source = earlier.name(), error = %e, "Could not back-fill company id");
                }
            }

            *self.cached.lock() = Some(tenant.clone());
            return Ok(tenant);
        }

        Err(Error::NoTenantResolved)
    }

    /// The cached tenant, if one has been resolved.
    #[must_use]
    pub fn cached(&self) -> Option<TenantId> {
        self.cached.lock().clone()
    }

    /// Forget the cached tenant (logout). Stored ids are kept.
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }

    /// Bind this device to `tenant` explicitly.
    ///
    /// # Errors
    ///
    /// Returns the first error from a source that failed to store it.
    pub fn set_tenant(&self, tenant: &TenantId) -> Result<()> {
        for source in &self.sources {
            source.remember(tenant)?;
        }
        info!(tenant = %tenant, "Company bound to device");
        *self.cached.lock() = Some(tenant.clone());
        Ok(())
    }

    /// Remove the stored tenant from every source and the cache.
    ///
    /// # Errors
    ///
    /// Returns the first error from a source that failed to clear it.
    pub fn clear_tenant(&self) -> Result<()> {
        self.invalidate();
        for source in &self.sources {
            source.forget()?;
        }
        Ok(())
    }
}
