//! CLI command handlers.

mod db;
mod keys;
mod query;
mod whois;

pub use db::{run_db_export_command, run_db_query_command};
pub use keys::{run_set_email_command, run_set_key_command};
pub use query::run_query_command;
pub use whois::run_whois_command;

use std::path::Path;

use anyhow::{Context, Result, bail};
use dehasher_core::db::DEFAULT_BUSY_TIMEOUT_MS;
use dehasher_core::provider::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};
use dehasher_core::{
    ApiCredentials, AppPaths, ClientSettings, Database, KeyStore, ProviderClient, RecordField,
    RecordQuery, ResultStore, SearchField, SearchFilter,
};
use tracing::debug;

use crate::app_config::FileConfig;
use crate::cli::FieldArgs;

const MISSING_KEY_MESSAGE: &str = "API key is required. Use --key or store one with `dehasher set-key <KEY>`.\n  \
     Suggestion: run `dehasher set-key <KEY>` once, then retry";

/// Resolved state shared by every command.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub paths: AppPaths,
    pub config: FileConfig,
    /// `--key` from the command line.
    pub key: Option<String>,
    /// `--email` from the command line.
    pub email: Option<String>,
    pub quiet: bool,
}

impl RunContext {
    pub fn keystore(&self) -> KeyStore {
        KeyStore::new(self.paths.keystore())
    }

    /// Flags first, then the key store.
    pub fn credentials(&self) -> Result<ApiCredentials> {
        let stored = self
            .keystore()
            .load()
            .context("Failed to read stored API credentials")?;

        let key = non_blank(self.key.clone()).or_else(|| non_blank(stored.api_key));
        let Some(key) = key else {
            bail!(MISSING_KEY_MESSAGE);
        };
        let email = non_blank(self.email.clone()).or_else(|| non_blank(stored.api_email));
        Ok(ApiCredentials::new(key, email))
    }

    pub fn client_settings(&self) -> ClientSettings {
        let mut settings = ClientSettings {
            request_timeout_secs: self
                .config
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout_secs: self
                .config
                .connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ..ClientSettings::default()
        };
        if let Some(base_url) = self.config.api_base_url_with_env() {
            settings.base_url = base_url;
        }
        settings
    }

    pub fn provider_client(&self) -> Result<ProviderClient> {
        let credentials = self.credentials()?;
        ProviderClient::new(credentials, &self.client_settings())
            .context("Failed to create provider client")
    }

    /// Opens the result store: `override_path`, then `db_path` from config,
    /// then the data-directory default.
    pub async fn open_store(&self, override_path: Option<&Path>) -> Result<ResultStore> {
        let path = override_path
            .map(Path::to_path_buf)
            .or_else(|| self.config.db_path.clone())
            .unwrap_or_else(|| self.paths.database());
        let busy_timeout = self
            .config
            .db_busy_timeout_ms
            .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);
        debug!(path = %path.display(), busy_timeout, "Opening result store");

        let db = Database::with_busy_timeout(&path, busy_timeout)
            .await
            .with_context(|| format!("Failed to open database '{}'", path.display()))?;
        Ok(ResultStore::new(db))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Provider-side filter from per-field flags.
pub fn search_filter(fields: &FieldArgs) -> SearchFilter {
    let mut filter = SearchFilter::new();
    for (field, value) in [
        (SearchField::Username, &fields.username),
        (SearchField::Email, &fields.email),
        (SearchField::IpAddress, &fields.ip),
        (SearchField::Password, &fields.password),
        (SearchField::HashedPassword, &fields.hash),
        (SearchField::Name, &fields.name),
        (SearchField::Domain, &fields.domain),
        (SearchField::Vin, &fields.vin),
        (SearchField::LicensePlate, &fields.license_plate),
        (SearchField::Address, &fields.address),
        (SearchField::Phone, &fields.phone),
        (SearchField::Social, &fields.social),
        (SearchField::CryptoAddress, &fields.crypto),
    ] {
        filter.insert_opt(field, value.as_deref());
    }
    filter
}

/// Local-store filter from per-field flags.
pub fn record_query(fields: &FieldArgs) -> RecordQuery {
    let mut query = RecordQuery::new();
    for (field, value) in [
        (RecordField::Username, &fields.username),
        (RecordField::Email, &fields.email),
        (RecordField::IpAddress, &fields.ip),
        (RecordField::Password, &fields.password),
        (RecordField::HashedPassword, &fields.hash),
        (RecordField::Name, &fields.name),
        (RecordField::Url, &fields.domain),
        (RecordField::Vin, &fields.vin),
        (RecordField::LicensePlate, &fields.license_plate),
        (RecordField::Address, &fields.address),
        (RecordField::Phone, &fields.phone),
        (RecordField::Social, &fields.social),
        (RecordField::CryptocurrencyAddress, &fields.crypto),
    ] {
        if let Some(value) = value {
            query = query.filter(field, value.as_str());
        }
    }
    query
}
