//! `set-key` / `set-email` handlers.

use anyhow::{Context, Result};

use super::RunContext;

pub fn run_set_key_command(ctx: &RunContext, key: &str) -> Result<()> {
    let store = ctx.keystore();
    store
        .set_key(key)
        .with_context(|| format!("Failed to store API key in '{}'", store.path().display()))?;
    println!("API key stored successfully");
    Ok(())
}

pub fn run_set_email_command(ctx: &RunContext, email: &str) -> Result<()> {
    let store = ctx.keystore();
    store
        .set_email(email)
        .with_context(|| format!("Failed to store API email in '{}'", store.path().display()))?;
    println!("API email stored successfully");
    Ok(())
}
