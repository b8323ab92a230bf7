//! ledger-sync CLI entry point.

use clap::Parser;
use colored::control::set_override;
use ledger_sync::cli::commands;
use ledger_sync::cli::{Cli, Commands};
use ledger_sync::error::Error;
use std::io::IsTerminal;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        set_override(false);
    }

    // Piped stdout gets JSON unless asked otherwise
    let json = cli.json || !std::io::stdout().is_terminal();

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,reqwest=info,hyper=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let db = cli.db.as_deref();
    let data_dir = cli.data_dir.as_deref();

    match &cli.command {
        Commands::Init { remote_url, force } => {
            commands::init::execute(db, data_dir, remote_url.as_deref(), *force, json)
        }
        Commands::Version => commands::version::execute(json),

        // Local ledger
        Commands::Record(args) => commands::record::execute(args, db, data_dir, json),
        Commands::Delete { id } => commands::delete::execute(id, db, data_dir, json),
        Commands::List { all, pending, limit } => {
            commands::list::execute(*all, *pending, *limit, db, data_dir, json)
        }
        Commands::History { id, limit } => {
            commands::history::execute(id, *limit, db, data_dir, json)
        }
        Commands::Status => commands::status::execute(db, data_dir, json),
        Commands::Retry { id } => commands::retry::execute(id.as_deref(), db, data_dir, json),

        // Sync
        Commands::Sync => commands::sync::execute(db, data_dir, json),
        Commands::Watch { interval } => commands::watch::execute(*interval, db, data_dir, json),

        Commands::Tenant { command } => commands::tenant::execute(command, db, data_dir, json),
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
