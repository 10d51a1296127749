//! `query` handler: search the provider, store and export the results.

use anyhow::{Context, Result};
use dehasher_core::fetch::DEFAULT_MAX_RECORDS;
use dehasher_core::{Dehasher, ExportOutcome, QueryOptions, QueryReport};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{RunContext, search_filter};
use crate::cli::QueryArgs;
use crate::output::FetchSpinner;

pub async fn run_query_command(ctx: &RunContext, args: &QueryArgs) -> Result<()> {
    let options = query_options(ctx, args);
    let client = ctx.provider_client()?;
    let store = ctx.open_store(None).await?;

    let cancel = CancellationToken::new();
    let interrupt = spawn_interrupt_listener(cancel.clone());

    let dehasher = Dehasher::new(&client, store, options).with_cancellation(cancel);
    let (query, _, plan) = dehasher.prepare()?;
    if !ctx.quiet {
        println!("Query: {query}");
        println!("{plan}");
    }

    let spinner = FetchSpinner::start(!ctx.quiet);
    let result = dehasher.run(|page| spinner.page(page)).await;
    spinner.finish();
    interrupt.abort();

    let report = result.context("Query failed")?;
    print_report(ctx, args, &report);
    Ok(())
}

fn query_options(ctx: &RunContext, args: &QueryArgs) -> QueryOptions {
    QueryOptions {
        filter: search_filter(&args.fields),
        max_records: args
            .max_records
            .or(ctx.config.default_max_records)
            .unwrap_or(DEFAULT_MAX_RECORDS),
        max_requests: args.max_requests,
        output_format: args
            .format
            .or(ctx.config.default_format)
            .unwrap_or_default(),
        output_file: args.output.clone(),
        exact_match: args.exact_match,
        regex_match: args.regex_match,
        wildcard_match: args.wildcard_match,
        creds_only: args.creds_only,
        plaintext_password: args.plaintext_password,
        starting_page: args.starting_page,
    }
}

/// Cancels the page loop on Ctrl-C; pages already fetched are still kept.
fn spawn_interrupt_listener(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current page");
            cancel.cancel();
        }
    })
}

fn print_report(ctx: &RunContext, args: &QueryArgs, report: &QueryReport) {
    info!(
        records = report.records_fetched,
        requests = report.requests_issued,
        total = report.total,
        "Query complete"
    );

    if !ctx.quiet {
        println!(
            "Retrieved {} records in {} requests ({} available)",
            report.records_fetched, report.requests_issued, report.total
        );
        if report.cancelled {
            println!("Interrupted before all pages were fetched; partial results kept.");
        }
        if let Some(persisted) = &report.persisted {
            println!(
                "Stored {} new records ({} already present)",
                persisted.inserted,
                persisted.skipped()
            );
        }
        if let Some(count) = report.credentials {
            println!("Extracted {count} credentials");
        }
    }
    if let Some(error) = &report.persist_error {
        eprintln!("Warning: some results were not stored locally: {error}");
    }

    match &report.export {
        ExportOutcome::Skipped => {
            if !ctx.quiet {
                println!("No results to export");
            }
        }
        ExportOutcome::Written(path) => {
            if !ctx.quiet {
                println!("Writing entries to file: {}", path.display());
            }
        }
        ExportOutcome::Fallback { error, payload } => {
            eprintln!("Error writing to file: {error}\n  Outputting to terminal.");
            println!("{payload}");
        }
    }

    if args.print_balance {
        println!("Balance: {}", report.balance);
    }
}
