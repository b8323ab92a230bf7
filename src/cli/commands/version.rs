//! Version command implementation.

use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    schema: usize,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) { "dev" } else { "release" };
    let schema = crate::storage::migrations::migration_count();

    if json {
        let payload = serde_json::to_string(&VersionOutput { version, build, schema })?;
        println!("{payload}");
        return Ok(());
    }

    println!("ledger-sync {version} ({build}, schema {schema})");
    Ok(())
}
