//! Paginated fetching.
//!
//! [`FetchPlan`] decides how many pages to ask for; [`fetch_pages`] walks
//! them sequentially against a [`SearchBackend`], stopping early when the
//! provider has nothing more to give.

mod plan;

pub use plan::{
    DEFAULT_MAX_RECORDS, DEFAULT_MAX_REQUESTS, FetchPlan, PROVIDER_DEFAULT_PAGE_SIZE,
    PROVIDER_MAX_PAGE_SIZE, PlanError,
};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::provider::{ProviderError, SearchBackend, SearchRequest};
use crate::query::MatchMode;
use crate::record::Record;

/// What one page returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageReport {
    /// 1-based page number sent to the provider.
    pub page: u32,
    /// Entries in this page.
    pub entries: usize,
    /// Total matches the provider reported.
    pub total: i64,
    /// Balance after this page.
    pub balance: i64,
}

/// Inputs for one paginated search.
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub query: &'a str,
    pub mode: MatchMode,
    pub plan: FetchPlan,
    /// First page to request; 0 is treated as 1.
    pub starting_page: u32,
}

impl<'a> FetchRequest<'a> {
    #[must_use]
    pub fn new(query: &'a str, mode: MatchMode, plan: FetchPlan) -> Self {
        Self {
            query,
            mode,
            plan,
            starting_page: 1,
        }
    }

    fn search_request(&self, page: u32) -> SearchRequest {
        let mut request = SearchRequest::new(self.query, page, self.plan.page_size());
        request.regex = self.mode.is_regex();
        request.wildcard = self.mode.is_wildcard();
        request
    }
}

/// Accumulated result of a paginated search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Entries in arrival order; duplicates are kept.
    pub records: Vec<Record>,
    /// Balance reported by the last page.
    pub balance: i64,
    /// Total reported by the last page.
    pub total: i64,
    pub requests_issued: u32,
    /// True when the token fired before the plan was exhausted.
    pub cancelled: bool,
}

/// Runs the plan against `backend`.
///
/// `on_page` is called after each decoded page, before the stop check.
///
/// # Errors
///
/// Returns the first [`ProviderError`]; nothing fetched so far is returned
/// in that case.
#[instrument(skip(backend, request, cancel, on_page), fields(
    page_size = request.plan.page_size(),
    page_count = request.plan.page_count(),
    mode = request.mode.as_str()
))]
pub async fn fetch_pages<F>(
    backend: &dyn SearchBackend,
    request: &FetchRequest<'_>,
    cancel: &CancellationToken,
    mut on_page: F,
) -> Result<FetchOutcome, ProviderError>
where
    F: FnMut(&PageReport),
{
    let page_size = i64::from(request.plan.page_size());
    let mut page = request.starting_page.max(1);
    let mut offset: i64 = 0;
    let mut outcome = FetchOutcome::default();

    for _ in 0..request.plan.page_count() {
        if cancel.is_cancelled() {
            info!(
                fetched = outcome.records.len(),
                "Fetch cancelled before page {page}"
            );
            outcome.cancelled = true;
            break;
        }

        let response = backend.search(&request.search_request(page)).await?;
        outcome.requests_issued += 1;

        let report = PageReport {
            page,
            entries: response.entries.len(),
            total: response.total,
            balance: response.balance,
        };
        debug!(
            page = report.page,
            entries = report.entries,
            total = report.total,
            "Page received"
        );
        on_page(&report);

        outcome.balance = response.balance;
        outcome.total = response.total;
        let short_page = i64::try_from(response.entries.len()).unwrap_or(i64::MAX) < page_size;
        outcome.records.extend(response.entries);

        if response.total - offset < page_size || short_page {
            debug!(page, offset, "Short page; no further pages");
            break;
        }
        offset += page_size;
        page += 1;
    }

    info!(
        records = outcome.records.len(),
        requests = outcome.requests_issued,
        balance = outcome.balance,
        "Fetch complete"
    );
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::provider::SearchResponse;

    /// Replays canned responses and records every request it sees.
    struct ScriptedBackend {
        responses: Mutex<VecDeque<Result<SearchResponse, ProviderError>>>,
        seen: Mutex<Vec<SearchRequest>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<SearchResponse, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<SearchRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchBackend for ScriptedBackend {
        async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ProviderError> {
            self.seen.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(SearchResponse::default()))
        }
    }

    fn page(count: usize, total: i64, start: usize) -> SearchResponse {
        SearchResponse {
            balance: 42,
            entries: (start..start + count)
                .map(|i| Record::with_id(format!("id-{i}")))
                .collect(),
            success: true,
            took: "1ms".to_string(),
            total,
        }
    }

    #[tokio::test]
    async fn test_fifty_records_single_request() {
        let backend = ScriptedBackend::new(vec![Ok(page(50, 50, 0))]);
        let plan = FetchPlan::compute(50, -1).unwrap();
        let request = FetchRequest::new("username:alice", MatchMode::Plain, plan);

        let outcome = fetch_pages(&backend, &request, &CancellationToken::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(outcome.requests_issued, 1);
        assert_eq!(outcome.records.len(), 50);
        assert_eq!(outcome.balance, 42);
        let seen = backend.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].page, 1);
        assert_eq!(seen[0].size, 50);
        assert!(seen[0].de_dupe);
    }

    #[tokio::test]
    async fn test_short_page_stops_loop() {
        let backend = ScriptedBackend::new(vec![Ok(page(37, 37, 0)), Ok(page(100, 1000, 37))]);
        let plan = FetchPlan::compute(25_000, -1).unwrap();
        assert_eq!(plan.page_count(), 3);
        let request = FetchRequest::new("email:a", MatchMode::Plain, plan);

        let outcome = fetch_pages(&backend, &request, &CancellationToken::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(outcome.requests_issued, 1);
        assert_eq!(outcome.records.len(), 37);
    }

    #[tokio::test]
    async fn test_fewer_entries_than_page_size_stops_even_with_large_total() {
        let plan = FetchPlan::compute(100, -1).unwrap();
        let backend = ScriptedBackend::new(vec![Ok(page(37, 5_000, 0))]);
        let request = FetchRequest::new("email:a", MatchMode::Plain, plan);

        let outcome = fetch_pages(&backend, &request, &CancellationToken::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(outcome.requests_issued, 1);
        assert_eq!(outcome.records.len(), 37);
        assert_eq!(outcome.total, 5_000);
    }

    #[tokio::test]
    async fn test_full_pages_advance_page_number() {
        let plan = FetchPlan::compute(15_000, -1).unwrap();
        assert_eq!(plan.page_count(), 2);
        let backend = ScriptedBackend::new(vec![
            Ok(page(10_000, 25_000, 0)),
            Ok(page(10_000, 25_000, 10_000)),
        ]);
        let mut request = FetchRequest::new("name:bob", MatchMode::Wildcard, plan);
        request.starting_page = 0;
        let mut reports = Vec::new();

        let outcome = fetch_pages(&backend, &request, &CancellationToken::new(), |report| {
            reports.push(*report);
        })
        .await
        .unwrap();

        assert_eq!(outcome.requests_issued, 2);
        assert_eq!(outcome.records.len(), 20_000);
        let pages: Vec<u32> = backend.seen().iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 2]);
        assert!(backend.seen().iter().all(|r| r.wildcard && !r.regex));
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].page, 2);
    }

    #[tokio::test]
    async fn test_provider_error_aborts() {
        let plan = FetchPlan::compute(25_000, -1).unwrap();
        let backend = ScriptedBackend::new(vec![
            Ok(page(10_000, 30_000, 0)),
            Err(ProviderError::from_status(429)),
        ]);
        let request = FetchRequest::new("ip_address:1.2.3.4", MatchMode::Plain, plan);

        let err = fetch_pages(&backend, &request, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::RateLimited));
        assert_eq!(backend.seen().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_token_issues_no_requests() {
        let plan = FetchPlan::compute(100, -1).unwrap();
        let backend = ScriptedBackend::new(vec![Ok(page(100, 100, 0))]);
        let request = FetchRequest::new("username:alice", MatchMode::Plain, plan);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = fetch_pages(&backend, &request, &cancel, |_| {})
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.requests_issued, 0);
        assert!(backend.seen().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_between_pages_keeps_fetched_records() {
        let plan = FetchPlan::compute(25_000, -1).unwrap();
        let backend = ScriptedBackend::new(vec![
            Ok(page(10_000, 30_000, 0)),
            Ok(page(10_000, 30_000, 10_000)),
        ]);
        let request = FetchRequest::new("username:alice", MatchMode::Regex, plan);
        let cancel = CancellationToken::new();

        let outcome = fetch_pages(&backend, &request, &cancel, |_| cancel.cancel())
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.requests_issued, 1);
        assert_eq!(outcome.records.len(), 10_000);
        assert!(backend.seen()[0].regex);
    }
}
