//! `db query` / `db export` handlers over the local result store.

use anyhow::{Context, Result, bail};
use dehasher_core::{OutputFormat, RecordQuery, export};
use tracing::info;

use super::{RunContext, record_query};
use crate::cli::{DbExportArgs, DbFilterArgs, DbQueryArgs, DisplayFormat};
use crate::output::{self, DEFAULT_TABLE_COLUMNS};

const MISSING_FILTER_MESSAGE: &str = "At least one search parameter is required.\n  \
     Suggestion: pass a field filter such as --username or --non-empty password";

fn build_query(filters: &DbFilterArgs) -> Result<RecordQuery> {
    let mut query = record_query(&filters.fields)
        .exact(filters.exact)
        .limit(filters.limit);
    for &field in &filters.non_empty {
        query = query.non_empty(field);
    }
    if query.is_unconstrained() {
        bail!(MISSING_FILTER_MESSAGE);
    }
    Ok(query)
}

pub async fn run_db_query_command(ctx: &RunContext, args: &DbQueryArgs) -> Result<()> {
    let query = build_query(&args.filters)?;
    let store = ctx.open_store(args.filters.db_path.as_deref()).await?;

    let count = store
        .count(&query)
        .await
        .context("Failed to count stored results")?;
    let records = store
        .query(&query)
        .await
        .context("Failed to query stored results")?;

    println!("Found {count} results (showing {}):", records.len());
    if records.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    let columns = if args.display.is_empty() {
        DEFAULT_TABLE_COLUMNS.as_slice()
    } else {
        args.display.as_slice()
    };
    match args.format {
        DisplayFormat::Json => {
            let rendered = export::render_records(&records, OutputFormat::Json)
                .context("Failed to format results")?;
            println!("{rendered}");
        }
        DisplayFormat::Table => print!("{}", output::render_table(&records, columns)),
        DisplayFormat::Simple => print!("{}", output::render_simple(&records, columns)),
    }
    Ok(())
}

pub async fn run_db_export_command(ctx: &RunContext, args: &DbExportArgs) -> Result<()> {
    let query = build_query(&args.filters)?;
    let store = ctx.open_store(args.filters.db_path.as_deref()).await?;
    if !ctx.quiet {
        println!("Exporting database...");
    }

    let written = if args.creds_only {
        let credentials = store
            .credentials_matching(&query)
            .await
            .context("Failed to query stored credentials")?;
        if credentials.is_empty() {
            println!("No results found.");
            return Ok(());
        }
        export::write_credentials(&credentials, args.format, &args.output)
    } else {
        let records = store
            .query(&query)
            .await
            .context("Failed to query stored results")?;
        if records.is_empty() {
            println!("No results found.");
            return Ok(());
        }
        export::write_records(&records, args.format, &args.output)
    }
    .context("Error writing to file")?;

    info!(path = %written.display(), "Database export written");
    println!("Exported successfully to file: {}", written.display());
    Ok(())
}
