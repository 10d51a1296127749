//! `whois` handler: lookups and reverse searches, printed verbatim.

use anyhow::{Context, Result};
use dehasher_core::ProviderClient;
use dehasher_core::provider::WhoisRequest;
use tracing::warn;

use super::RunContext;
use crate::cli::WhoisArgs;

pub async fn run_whois_command(ctx: &RunContext, args: &WhoisArgs) -> Result<()> {
    let client = ctx.provider_client()?;

    if args.credits {
        let credits = client
            .whois_credits()
            .await
            .context("Failed to get WHOIS credits")?;
        print_section("WHOIS Credits:", &credits);
        return Ok(());
    }

    if let Some(domain) = args.domain.as_deref() {
        return run_domain_lookup(&client, domain).await;
    }

    let (title, request, failure) = if let Some(ip) = args.ip.as_deref() {
        (
            "IP Lookup Result:",
            WhoisRequest::reverse_ip(ip),
            "IP lookup failed",
        )
    } else if let Some(mx) = args.mx.as_deref() {
        (
            "MX Lookup Result:",
            WhoisRequest::reverse_mx(mx),
            "MX lookup failed",
        )
    } else if let Some(ns) = args.ns.as_deref() {
        (
            "NS Lookup Result:",
            WhoisRequest::reverse_ns(ns),
            "NS lookup failed",
        )
    } else {
        (
            "Reverse WHOIS Result:",
            WhoisRequest::reverse_whois(
                args.include.clone(),
                args.exclude.clone(),
                args.reverse_type,
            ),
            "Reverse WHOIS search failed",
        )
    };

    let body = client.whois(&request).await.context(failure)?;
    print_section(title, &body);
    Ok(())
}

/// Lookup is required; history and subdomain scan failures are reported
/// and skipped.
async fn run_domain_lookup(client: &ProviderClient, domain: &str) -> Result<()> {
    let lookup = client
        .whois(&WhoisRequest::lookup(domain))
        .await
        .context("WHOIS lookup failed")?;
    print_section("WHOIS Lookup Result:", &lookup);

    match client.whois(&WhoisRequest::history(domain)).await {
        Ok(history) => print_section("\nWHOIS History:", &history),
        Err(error) => {
            warn!(error = %error, domain, "WHOIS history lookup failed");
            eprintln!("Error performing WHOIS history lookup: {error}");
        }
    }

    match client.whois(&WhoisRequest::subdomain_scan(domain)).await {
        Ok(subdomains) => print_section("\nSubdomain Scan:", &subdomains),
        Err(error) => {
            warn!(error = %error, domain, "Subdomain scan failed");
            eprintln!("Error performing subdomain scan: {error}");
        }
    }

    Ok(())
}

fn print_section(title: &str, body: &str) {
    println!("{title}");
    println!("{body}");
}
