//! Dehasher Core Library
//!
//! Client-side machinery for a breach-data search API: turning field
//! filters into provider queries, budgeting and walking paginated searches,
//! storing results idempotently in SQLite, and exporting them.
//!
//! # Architecture
//!
//! - [`query`] - field filters to provider query strings
//! - [`fetch`] - request budgeting and the sequential page loop
//! - [`provider`] - HTTP client for search and WHOIS endpoints
//! - [`store`] - batched, idempotent result and credential persistence
//! - [`export`] - JSON / XML / YAML / text rendering
//! - [`dehasher`] - one end-to-end `query` invocation
//! - [`db`] - database connection and schema management
//! - [`keystore`] - API key and account email storage

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod db;
pub mod dehasher;
pub mod export;
pub mod fetch;
pub mod keystore;
pub mod paths;
pub mod provider;
pub mod query;
pub mod record;
pub mod store;

// Re-export commonly used types
pub use db::{Database, DbError};
pub use dehasher::{Dehasher, DehasherError, ExportOutcome, QueryOptions, QueryReport};
pub use export::{ExportError, OutputFormat};
pub use fetch::{FetchOutcome, FetchPlan, PageReport, PlanError, fetch_pages};
pub use keystore::{KeyStore, KeyStoreError, StoredKeys};
pub use paths::AppPaths;
pub use provider::{
    ApiCredentials, ClientSettings, ProviderClient, ProviderError, SearchBackend, SearchRequest,
    SearchResponse,
};
pub use query::{MatchMode, QueryError, SearchField, SearchFilter};
pub use record::{Record, RecordField};
pub use store::{PersistReport, RecordQuery, ResultStore, StoreError, StoredCredential};
