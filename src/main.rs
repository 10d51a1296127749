//! CLI entry point for dehasher.

use anyhow::{Context, Result};
use clap::Parser;
use dehasher_core::AppPaths;
use tracing::{debug, info};

mod app_config;
mod cli;
mod commands;
mod output;

use cli::{Args, Command, DbCommand};
use commands::RunContext;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(verbose = args.verbose, quiet = args.quiet, "CLI arguments parsed");

    let loaded = app_config::load_default_file_config()?;
    if loaded.loaded_from_file
        && let Some(path) = loaded.path.as_deref()
    {
        info!(path = %path.display(), "Loaded configuration file");
    }

    let paths = AppPaths::from_env().context("Failed to resolve data directory")?;
    let ctx = RunContext {
        paths,
        config: loaded.config,
        key: args.key,
        email: args.email,
        quiet: args.quiet,
    };

    match args.command {
        Command::Query(query) => commands::run_query_command(&ctx, &query).await,
        Command::Db { command } => match command {
            DbCommand::Query(query) => commands::run_db_query_command(&ctx, &query).await,
            DbCommand::Export(export) => commands::run_db_export_command(&ctx, &export).await,
        },
        Command::Whois(whois) => commands::run_whois_command(&ctx, &whois).await,
        Command::SetKey { key } => commands::run_set_key_command(&ctx, &key),
        Command::SetEmail { email } => commands::run_set_email_command(&ctx, &email),
    }
}
