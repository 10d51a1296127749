//! reqwest client for provider endpoints.
//!
//! Centralizes timeout, redirect and authentication policy so the search
//! and WHOIS calls behave the same way.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy, RequestBuilder, redirect};
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::ProviderError;
use super::{SearchRequest, SearchResponse};

/// Production API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.dehashed.com";

/// Per-request timeout applied to every provider call.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connect timeout applied to every provider call.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const API_KEY_HEADER: &str = "Dehashed-Api-Key";
const SEARCH_PATH: &str = "v2/search";

/// API key plus the optional account email paired with it.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    key: String,
    email: Option<String>,
}

impl ApiCredentials {
    /// Creates credentials; a blank email is treated as absent.
    #[must_use]
    pub fn new(key: impl Into<String>, email: Option<String>) -> Self {
        Self {
            key: key.into(),
            email: email.filter(|value| !value.trim().is_empty()),
        }
    }

    /// Account email, when configured.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("key", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

/// Network settings for [`ProviderClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// API root; endpoint paths are joined onto it.
    pub base_url: String,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ClientSettings {
    /// Default settings against a different API root.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// HTTP client for the provider API.
///
/// Built once per invocation and reused for every page.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: Client,
    base_url: Url,
    credentials: ApiCredentials,
}

impl ProviderClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidBaseUrl`] for an unusable base URL, or
    /// [`ProviderError::ClientBuild`] when reqwest cannot build a client.
    pub fn new(credentials: ApiCredentials, settings: &ClientSettings) -> Result<Self, ProviderError> {
        let base_url = normalize_base_url(&settings.base_url)?;
        let http = build_http_client(settings)?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Performs one search call.
    ///
    /// # Errors
    ///
    /// Returns the mapped [`ProviderError`] for non-success statuses,
    /// transport failures and undecodable bodies.
    #[instrument(skip(self, request), fields(page = request.page, size = request.size))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ProviderError> {
        let body = self.post_json(SEARCH_PATH, request).await?;
        let url = self.endpoint(SEARCH_PATH)?;
        let response: SearchResponse =
            serde_json::from_str(&body).map_err(|source| ProviderError::Decode {
                url: url.to_string(),
                source,
            })?;
        debug!(
            entries = response.entries.len(),
            total = response.total,
            balance = response.balance,
            "Search page decoded"
        );
        Ok(response)
    }

    /// POSTs a JSON body and returns the raw response text.
    pub(crate) async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<String, ProviderError> {
        let url = self.endpoint(path)?;
        let request = self.authorize(self.http.post(url.clone())).json(body);
        self.execute(&url, request).await
    }

    /// GETs an endpoint and returns the raw response text.
    pub(crate) async fn get_text(&self, path: &str) -> Result<String, ProviderError> {
        let url = self.endpoint(path)?;
        let request = self.authorize(self.http.get(url.clone()));
        self.execute(&url, request).await
    }

    async fn execute(&self, url: &Url, request: RequestBuilder) -> Result<String, ProviderError> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| ProviderError::transport(url.as_str(), source))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Provider returned error status");
            return Err(ProviderError::from_status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|source| ProviderError::transport(url.as_str(), source))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header(API_KEY_HEADER, &self.credentials.key);
        match self.credentials.email() {
            Some(email) => builder.basic_auth(email, Some(&self.credentials.key)),
            None => builder,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|error| ProviderError::InvalidBaseUrl {
                base: self.base_url.to_string(),
                reason: error.to_string(),
            })
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, ProviderError> {
    let invalid = |reason: String| ProviderError::InvalidBaseUrl {
        base: raw.to_string(),
        reason,
    };
    let mut url = Url::parse(raw.trim()).map_err(|error| invalid(error.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot be a base".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn build_http_client(settings: &ClientSettings) -> Result<Client, ProviderError> {
    match try_build_client(settings, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when reading system proxy
            // settings; retry with env proxies only.
            warn!("HTTP client hit system proxy panic; using env-proxy fallback builder");
            match try_build_client(settings, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Build(error)) => Err(ProviderError::ClientBuild(error)),
                Err(BuildClientFailure::Panic) => Err(ProviderError::InvalidBaseUrl {
                    base: settings.base_url.clone(),
                    reason: "HTTP client construction panicked".to_string(),
                }),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(ProviderError::ClientBuild(error)),
    }
}

fn try_build_client(
    settings: &ClientSettings,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let settings = settings.clone();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(&settings);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(settings: &ClientSettings) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .redirect(redirect::Policy::none())
        .user_agent(concat!("dehasher/", env!("CARGO_PKG_VERSION")))
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"])
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"])
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
