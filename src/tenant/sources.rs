//! Identity sources consulted by the tenant resolver.
//!
//! Precedence is fixed by the order the resolver is built with:
//!
//! 1. [`SecureStorageSource`] - owner-only file in the app data dir
//! 2. [`LocalStorageSource`] - shared key/value JSON file (`companyId` key)
//! 3. [`RemoteLookupSource`] - asks the backend which company the session belongs to

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use super::{AuthSession, IdentityLookup, IdentitySource};
use crate::error::Result;
use crate::model::TenantId;

/// File name of the secure-storage slot.
pub const SECURE_STORAGE_FILE: &str = "company_id";

/// File name of the local-storage key/value file.
pub const LOCAL_STORAGE_FILE: &str = "local_storage.json";

/// Key holding the company id inside local storage.
pub const COMPANY_ID_KEY: &str = "companyId";

/// Write a file via temp file + rename, readable by the owner only.
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let temp_path = path.with_extension("tmp");
    {
        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        opts.mode(0o600);
        let mut file = opts.open(&temp_path)?;
        file.write_all(contents)?;
        file.flush()?;
    }
    fs::rename(&temp_path, path)
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

// ── Secure storage ────────────────────────────────────────────

/// On-device secure storage: a single value in an owner-only file.
#[derive(Debug, Clone)]
pub struct SecureStorageSource {
    path: PathBuf,
}

impl SecureStorageSource {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SECURE_STORAGE_FILE),
        }
    }
}

#[async_trait]
impl IdentitySource for SecureStorageSource {
    fn name(&self) -> &'static str {
        "secure_storage"
    }

    async fn read(&self, _session: Option<&AuthSession>) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw.trim().to_string()).filter(|v| !v.is_empty())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remember(&self, tenant: &TenantId) -> Result<()> {
        Ok(write_private(&self.path, tenant.as_str().as_bytes())?)
    }

    fn forget(&self) -> Result<()> {
        Ok(remove_if_present(&self.path)?)
    }
}

// ── Local storage ─────────────────────────────────────────────

/// Key/value JSON file shared with other parts of the app.
///
/// Other keys in the file are preserved on write.
#[derive(Debug, Clone)]
pub struct LocalStorageSource {
    path: PathBuf,
}

impl LocalStorageSource {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(LOCAL_STORAGE_FILE),
        }
    }

    fn load(&self) -> Result<Map<String, Value>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, map: &Map<String, Value>) -> Result<()> {
        let json = serde_json::to_string_pretty(map)?;
        Ok(write_private(&self.path, json.as_bytes())?)
    }
}

#[async_trait]
impl IdentitySource for LocalStorageSource {
    fn name(&self) -> &'static str {
        "local_storage"
    }

    async fn read(&self, _session: Option<&AuthSession>) -> Result<Option<String>> {
        let map = self.load()?;
        match map.get(COMPANY_ID_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone()).filter(|v| !v.trim().is_empty())),
            Some(other) => {
                warn!(value = %other, "Non-string companyId in local storage");
                Ok(None)
            }
        }
    }

    fn remember(&self, tenant: &TenantId) -> Result<()> {
        let mut map = self.load().unwrap_or_default();
        map.insert(
            COMPANY_ID_KEY.to_string(),
            Value::String(tenant.as_str().to_string()),
        );
        self.save(&map)
    }

    fn forget(&self) -> Result<()> {
        let mut map = self.load()?;
        if map.remove(COMPANY_ID_KEY).is_some() {
            self.save(&map)?;
        }
        Ok(())
    }
}

// ── Remote lookup ─────────────────────────────────────────────

/// Asks the backend which company the signed-in user belongs to.
///
/// Needs a session; without one it reports nothing.
#[derive(Clone)]
pub struct RemoteLookupSource {
    lookup: Arc<dyn IdentityLookup>,
}

impl RemoteLookupSource {
    #[must_use]
    pub fn new(lookup: Arc<dyn IdentityLookup>) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl IdentitySource for RemoteLookupSource {
    fn name(&self) -> &'static str {
        "remote_lookup"
    }

    async fn read(&self, session: Option<&AuthSession>) -> Result<Option<String>> {
        match session {
            Some(session) => self.lookup.company_for_session(session).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPANY: &str = "7d444840-9dc0-11d1-b245-5ffdce74fad2";

    #[tokio::test]
    async fn test_secure_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = SecureStorageSource::new(dir.path());
        assert_eq!(source.read(None).await.unwrap(), None);

        source.remember(&TenantId::parse(COMPANY).unwrap()).unwrap();
        assert_eq!(source.read(None).await.unwrap().as_deref(), Some(COMPANY));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dir.path().join(SECURE_STORAGE_FILE))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        source.forget().unwrap();
        assert_eq!(source.read(None).await.unwrap(), None);
        source.forget().unwrap();
    }

    #[tokio::test]
    async fn test_local_storage_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(LOCAL_STORAGE_FILE),
            r#"{"theme":"dark","companyId":""}"#,
        )
        .unwrap();
        let source = LocalStorageSource::new(dir.path());
        assert_eq!(source.read(None).await.unwrap(), None);

        source.remember(&TenantId::parse(COMPANY).unwrap()).unwrap();
        assert_eq!(source.read(None).await.unwrap().as_deref(), Some(COMPANY));

        let raw = fs::read_to_string(dir.path().join(LOCAL_STORAGE_FILE)).unwrap();
        let map: Map<String, Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(map["theme"], "dark");

        source.forget().unwrap();
        assert_eq!(source.read(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_local_storage_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LOCAL_STORAGE_FILE), "{not json").unwrap();
        let source = LocalStorageSource::new(dir.path());
        assert!(source.read(None).await.is_err());
    }
}
