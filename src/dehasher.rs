//! One `query` invocation: build, plan, fetch, persist, export.

use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::export::{self, ExportError, OutputFormat};
use crate::fetch::{
    self, DEFAULT_MAX_RECORDS, DEFAULT_MAX_REQUESTS, FetchPlan, FetchRequest, PageReport, PlanError,
};
use crate::provider::{ProviderError, SearchBackend};
use crate::query::{MatchMode, QueryError, SearchFilter};
use crate::store::{PersistReport, ResultStore, StoredCredential, extract_credentials};

/// Default output file stem.
pub const DEFAULT_OUTPUT_FILE: &str = "query";

/// Errors that abort a query invocation.
#[derive(Debug, Error)]
pub enum DehasherError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Neither the file write nor the stdout fallback could be rendered.
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Settings for one `query` run.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub filter: SearchFilter,
    pub max_records: i64,
    pub max_requests: i64,
    pub output_format: OutputFormat,
    pub output_file: String,
    pub exact_match: bool,
    pub regex_match: bool,
    pub wildcard_match: bool,
    /// Export only login/password pairs.
    pub creds_only: bool,
    /// Send passwords as typed instead of as SHA-256 hashes.
    pub plaintext_password: bool,
    pub starting_page: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            filter: SearchFilter::new(),
            max_records: DEFAULT_MAX_RECORDS,
            max_requests: DEFAULT_MAX_REQUESTS,
            output_format: OutputFormat::Json,
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            exact_match: false,
            regex_match: false,
            wildcard_match: false,
            creds_only: false,
            plaintext_password: false,
            starting_page: 1,
        }
    }
}

/// Where the export ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Nothing was fetched, so nothing was written.
    Skipped,
    Written(PathBuf),
    /// Writing failed; `payload` is the indented JSON to show instead.
    Fallback { error: String, payload: String },
}

/// Summary of one invocation.
#[derive(Debug, Clone)]
pub struct QueryReport {
    pub query: String,
    pub plan: FetchPlan,
    pub records_fetched: usize,
    pub requests_issued: u32,
    pub balance: i64,
    pub total: i64,
    pub cancelled: bool,
    /// `None` when a batch failed; see `persist_error`.
    pub persisted: Option<PersistReport>,
    pub persist_error: Option<String>,
    /// Credentials extracted in creds-only mode.
    pub credentials: Option<usize>,
    pub export: ExportOutcome,
}

/// Runs one search against a backend and a store.
pub struct Dehasher<'a> {
    backend: &'a dyn SearchBackend,
    store: ResultStore,
    options: QueryOptions,
    cancel: CancellationToken,
}

impl<'a> Dehasher<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn SearchBackend, store: ResultStore, options: QueryOptions) -> Self {
        Self {
            backend,
            store,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` to stop between pages.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Validates options and computes the query string and plan without
    /// touching the network.
    ///
    /// # Errors
    ///
    /// Returns [`DehasherError::Query`] or [`DehasherError::Plan`].
    pub fn prepare(&self) -> Result<(String, MatchMode, FetchPlan), DehasherError> {
        let options = &self.options;
        let mode = MatchMode::from_flags(
            options.exact_match,
            options.regex_match,
            options.wildcard_match,
        )?;
        let query = options.filter.build(mode, !options.plaintext_password)?;
        let plan = FetchPlan::compute(options.max_records, options.max_requests)?;
        Ok((query, mode, plan))
    }

    /// Runs the whole invocation.
    ///
    /// `on_page` sees every page as it arrives. Store failures are logged and
    /// reported, never returned.
    ///
    /// # Errors
    ///
    /// Returns [`DehasherError`] for invalid input, provider failures, or an
    /// export that could not even be rendered as JSON.
    #[instrument(skip(self, on_page))]
    pub async fn run<F>(&self, on_page: F) -> Result<QueryReport, DehasherError>
    where
        F: FnMut(&PageReport),
    {
        let (query, mode, plan) = self.prepare()?;
        info!(%plan, "Starting search");

        let mut request = FetchRequest::new(&query, mode, plan);
        request.starting_page = self.options.starting_page;
        let outcome = fetch::fetch_pages(self.backend, &request, &self.cancel, on_page).await?;

        let (persisted, persist_error) = match self.store.persist(&outcome.records).await {
            Ok(report) => (Some(report), None),
            Err(error) => {
                warn!(error = %error, "Some results were not stored");
                (None, Some(error.to_string()))
            }
        };

        let (credentials, export) = if self.options.creds_only {
            let creds = extract_credentials(&outcome.records);
            let count = creds.len();
            let export = self.export_credentials(creds).await?;
            (Some(count), export)
        } else {
            (None, self.export_records(&outcome.records)?)
        };

        Ok(QueryReport {
            query,
            plan,
            records_fetched: outcome.records.len(),
            requests_issued: outcome.requests_issued,
            balance: outcome.balance,
            total: outcome.total,
            cancelled: outcome.cancelled,
            persisted,
            persist_error,
            credentials,
            export,
        })
    }

    fn export_records(
        &self,
        records: &[crate::record::Record],
    ) -> Result<ExportOutcome, DehasherError> {
        if records.is_empty() {
            return Ok(ExportOutcome::Skipped);
        }
        let options = &self.options;
        match export::write_records(records, options.output_format, &options.output_file) {
            Ok(path) => Ok(ExportOutcome::Written(path)),
            Err(error) => {
                warn!(error = %error, "Export failed; falling back to terminal output");
                Ok(ExportOutcome::Fallback {
                    error: error.to_string(),
                    payload: export::render_records(records, OutputFormat::Json)?,
                })
            }
        }
    }

    async fn export_credentials(
        &self,
        creds: Vec<StoredCredential>,
    ) -> Result<ExportOutcome, DehasherError> {
        let persist = self.store.spawn_persist_credentials(creds.clone());

        let options = &self.options;
        let export = if creds.is_empty() {
            ExportOutcome::Skipped
        } else {
            match export::write_credentials(&creds, options.output_format, &options.output_file) {
                Ok(path) => ExportOutcome::Written(path),
                Err(error) => {
                    warn!(error = %error, "Export failed; falling back to terminal output");
                    ExportOutcome::Fallback {
                        error: error.to_string(),
                        payload: export::render_credentials(&creds, OutputFormat::Json)?,
                    }
                }
            }
        };

        match persist.await {
            Ok(Ok(report)) => info!(inserted = report.inserted, "Credentials stored"),
            Ok(Err(error)) => warn!(error = %error, "Failed to store credentials"),
            Err(error) => warn!(error = %error, "Credential store task did not complete"),
        }

        Ok(export)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::db::Database;
    use crate::provider::{SearchRequest, SearchResponse};
    use crate::query::SearchField;
    use crate::record::Record;
    use crate::store::RecordQuery;

    struct FixedBackend {
        entries: Vec<Record>,
        calls: Mutex<Vec<SearchRequest>>,
    }

    #[async_trait]
    impl SearchBackend for FixedBackend {
        async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ProviderError> {
            self.calls.lock().unwrap().push(request.clone());
            Ok(SearchResponse {
                balance: 10,
                entries: self.entries.clone(),
                success: true,
                took: String::new(),
                total: i64::try_from(self.entries.len()).unwrap(),
            })
        }
    }

    fn backend(entries: Vec<Record>) -> FixedBackend {
        FixedBackend {
            entries,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn options(dir: &tempfile::TempDir) -> QueryOptions {
        let mut filter = SearchFilter::new();
        filter.insert(SearchField::Username, "alice");
        QueryOptions {
            filter,
            output_file: dir.path().join("out").to_string_lossy().into_owned(),
            ..QueryOptions::default()
        }
    }

    async fn store() -> ResultStore {
        ResultStore::new(Database::new_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_prepare_rejects_empty_filter() {
        let backend = backend(Vec::new());
        let dehasher = Dehasher::new(&backend, store().await, QueryOptions::default());
        assert!(matches!(
            dehasher.prepare(),
            Err(DehasherError::Query(QueryError::EmptyFilter))
        ));
    }

    #[tokio::test]
    async fn test_prepare_rejects_zero_requests() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(Vec::new());
        let options = QueryOptions {
            max_requests: 0,
            ..options(&dir)
        };
        let dehasher = Dehasher::new(&backend, store().await, options);
        assert!(matches!(
            dehasher.prepare(),
            Err(DehasherError::Plan(PlanError::ZeroRequests))
        ));
    }

    #[tokio::test]
    async fn test_run_persists_and_exports() {
        let dir = tempfile::tempdir().unwrap();
        let records = (0..3)
            .map(|i| Record {
                username: vec![format!("alice{i}")],
                ..Record::with_id(format!("r{i}"))
            })
            .collect();
        let backend = backend(records);
        let store = store().await;
        let dehasher = Dehasher::new(&backend, store.clone(), options(&dir));

        let report = dehasher.run(|_| {}).await.unwrap();

        assert_eq!(report.query, "username:alice");
        assert_eq!(report.requests_issued, 1);
        assert_eq!(report.persisted.unwrap().inserted, 3);
        assert_eq!(
            report.export,
            ExportOutcome::Written(dir.path().join("out.json"))
        );
        assert_eq!(store.count(&RecordQuery::new()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_run_with_no_results_skips_export() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(Vec::new());
        let dehasher = Dehasher::new(&backend, store().await, options(&dir));

        let report = dehasher.run(|_| {}).await.unwrap();

        assert_eq!(report.export, ExportOutcome::Skipped);
        assert!(!dir.path().join("out.json").exists());
    }

    #[tokio::test]
    async fn test_unwritable_output_falls_back_to_json_payload() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(vec![Record::with_id("x")]);
        let options = QueryOptions {
            output_file: dir
                .path()
                .join("missing")
                .join("out")
                .to_string_lossy()
                .into_owned(),
            output_format: OutputFormat::Yaml,
            ..options(&dir)
        };
        let dehasher = Dehasher::new(&backend, store().await, options);

        let report = dehasher.run(|_| {}).await.unwrap();

        match report.export {
            ExportOutcome::Fallback { payload, .. } => assert!(payload.contains("\"id\": \"x\"")),
            other => panic!("expected fallback, got {other:?}"),
        }
    }
}
