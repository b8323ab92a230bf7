//! Tenant command implementation.

use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::cli::commands::Workspace;
use crate::cli::TenantCommands;
use crate::error::{Error, Result};
use crate::model::TenantId;

#[derive(Serialize)]
struct TenantOutput {
    tenant: Option<String>,
}

/// Execute tenant commands.
///
/// # Errors
///
/// `InvalidArgument` for a malformed company id, or a storage failure.
pub fn execute(
    command: &TenantCommands,
    db: Option<&Path>,
    data_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    let ws = Workspace::locate(db, data_dir)?;

    let tenant = match command {
        TenantCommands::Show => match ws.tenant() {
            Ok(tenant) => Some(tenant),
            Err(Error::NoTenantResolved) => None,
            Err(e) => return Err(e),
        },
        TenantCommands::Set { company_id } => {
            let tenant = TenantId::parse(company_id).ok_or_else(|| {
                Error::InvalidArgument(format!("'{company_id}' is not a valid company id"))
            })?;
            std::fs::create_dir_all(&ws.data_dir)?;
            ws.resolver().set_tenant(&tenant)?;
            Some(tenant)
        }
        TenantCommands::Clear => {
            ws.resolver().clear_tenant()?;
            None
        }
    };

    if json {
        let output = TenantOutput {
            tenant: tenant.as_ref().map(ToString::to_string),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    match (command, tenant) {
        (TenantCommands::Clear, _) => println!("Company binding removed."),
        (_, Some(tenant)) => println!("{} {}", "Company:".bold(), tenant.to_string().cyan()),
        (_, None) => println!("{}", "No company bound to this device".yellow()),
    }
    Ok(())
}
