//! Provider API access.
//!
//! - [`ProviderClient`] - reqwest client for the search and WHOIS endpoints
//! - [`SearchBackend`] - seam the page loop talks to
//! - [`ProviderError`] - status and transport error taxonomy

mod client;
mod error;
mod whois;

pub use client::{
    ApiCredentials, ClientSettings, DEFAULT_API_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS, ProviderClient,
};
pub use error::ProviderError;
pub use whois::{ReverseWhoisType, WhoisRequest, WhoisSearchType};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Body of one search call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub page: u32,
    pub size: u32,
    pub wildcard: bool,
    pub regex: bool,
    pub de_dupe: bool,
}

impl SearchRequest {
    /// Creates a request for the first page with provider dedup enabled.
    #[must_use]
    pub fn new(query: impl Into<String>, page: u32, size: u32) -> Self {
        Self {
            query: query.into(),
            page,
            size,
            wildcard: false,
            regex: false,
            de_dupe: true,
        }
    }
}

/// Decoded search response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Credits remaining on the account.
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub entries: Vec<Record>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub took: String,
    /// Total matches the provider holds for the query.
    #[serde(default)]
    pub total: i64,
}

/// Something that can answer one search page.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Performs one search call.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ProviderError>;
}

#[async_trait]
impl SearchBackend for ProviderClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ProviderError> {
        ProviderClient::search(self, request).await
    }
}
