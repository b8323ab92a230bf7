//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Offline-first ledger: record transactions locally, sync when online
#[derive(Parser, Debug)]
#[command(name = "ledger-sync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: <data-dir>/ledger.db)
    #[arg(long, global = true, env = "LEDGER_SYNC_DB")]
    pub db: Option<PathBuf>,

    /// Data directory holding the database, config and stored company id
    #[arg(long, global = true, env = "LEDGER_SYNC_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the local database and config
    Init {
        /// Remote store base URL to write into config.json
        #[arg(long)]
        remote_url: Option<String>,

        /// Re-run setup on an existing database (rows are kept)
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Record a transaction locally (synced later)
    Record(RecordArgs),

    /// Delete a transaction (removed remotely on next sync)
    Delete {
        /// Transaction ID
        id: String,
    },

    /// List local transactions
    List {
        /// Include deleted transactions awaiting sync
        #[arg(long)]
        all: bool,

        /// Only transactions not yet synced
        #[arg(long)]
        pending: bool,

        /// Maximum rows to show
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Show the audit trail of one transaction
    History {
        /// Transaction ID
        id: String,

        /// Maximum events to show
        #[arg(long, short = 'n', default_value = "20")]
        limit: u32,
    },

    /// Show sync status for the current company
    Status,

    /// Run one sync cycle now
    Sync,

    /// Re-queue transactions the remote rejected
    Retry {
        /// Transaction ID (default: all flagged transactions)
        id: Option<String>,
    },

    /// Keep syncing on an interval until interrupted
    Watch {
        /// Seconds between cycles (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Company binding for this device
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// income or expense (synonyms: revenue, credit, cost, debit, ...)
    pub kind: String,

    /// Amount, e.g. 15 or 15.50
    pub amount: String,

    /// Free-text description
    pub description: Vec<String>,

    /// Transaction date (YYYY-MM-DD, today, yesterday)
    #[arg(long, default_value = "today")]
    pub date: String,

    /// Edit an existing transaction instead of creating one
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum TenantCommands {
    /// Show the company this device is bound to
    Show,

    /// Bind this device to a company
    Set {
        /// Company ID
        company_id: String,
    },

    /// Remove the stored company binding
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_record_args_parse() {
        let cli = Cli::parse_from([
            "ledger-sync", "record", "expense", "15.50", "office", "chairs", "--date", "2026-02-01",
        ]);
        let Commands::Record(args) = cli.command else {
            panic!("expected record");
        };
        assert_eq!(args.kind, "expense");
        assert_eq!(args.amount, "15.50");
        assert_eq!(args.description, vec!["office", "chairs"]);
        assert_eq!(args.date, "2026-02-01");
    }
}
