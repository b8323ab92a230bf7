//! Initialize the local ledger.
//!
//! Creates the data directory, the SQLite mirror (schema is applied on
//! open) and, when a remote URL is given, `config.json`.

use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::commands::Workspace;
use crate::error::{Error, Result};
use crate::storage::LocalStore;

#[derive(Serialize)]
struct InitOutput {
    data_dir: PathBuf,
    database: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_url: Option<String>,
}

/// Execute the init command.
///
/// # Errors
///
/// `AlreadyInitialized` if the database exists and `force` is not set.
pub fn execute(
    db: Option<&Path>,
    data_dir: Option<&Path>,
    remote_url: Option<&str>,
    force: bool,
    json: bool,
) -> Result<()> {
    let mut ws = Workspace::locate(db, data_dir)?;

    if ws.db_path.exists() && !force {
        return Err(Error::AlreadyInitialized { path: ws.db_path });
    }

    fs::create_dir_all(&ws.data_dir)?;
    if let Some(parent) = ws.db_path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Opening applies pending migrations; existing rows are kept on --force
    LocalStore::open(&ws.db_path)?;

    if let Some(url) = remote_url {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::InvalidArgument(format!(
                "remote URL must start with http:// or https://, got '{url}'"
            )));
        }
        ws.config.remote_url = Some(url.to_string());
        ws.config.save(&ws.data_dir)?;
    }

    let output = InitOutput {
        data_dir: ws.data_dir.clone(),
        database: ws.db_path.clone(),
        remote_url: ws.config.remote_url(),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{} {}", "Initialized ledger at".green(), output.database.display());
        match &output.remote_url {
            Some(url) => println!("  Remote: {url}"),
            None => println!(
                "  {}",
                "No remote configured yet; records stay local until one is set".dimmed()
            ),
        }
        println!();
        println!("Next: bind a company with `ledger-sync tenant set <company-id>`");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SyncConfig, DB_FILE};

    #[test]
    fn test_init_creates_database_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");

        execute(None, Some(&data), Some("https://ledger.example"), false, true).unwrap();

        assert!(data.join(DB_FILE).exists());
        let config = SyncConfig::load(&data).unwrap();
        assert_eq!(config.remote_url.as_deref(), Some("https://ledger.example"));
    }

    #[test]
    fn test_init_twice_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        execute(None, Some(dir.path()), None, false, true).unwrap();

        let err = execute(None, Some(dir.path()), None, false, true).unwrap_err();
        assert!(matches!(err, Error::AlreadyInitialized { .. }));

        execute(None, Some(dir.path()), None, true, true).unwrap();
    }

    #[test]
    fn test_init_rejects_bad_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute(None, Some(dir.path()), Some("ftp://x"), false, true).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
