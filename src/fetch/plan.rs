//! Request budgeting: how many pages to request, and how large.

use std::fmt;

use thiserror::Error;
use tracing::info;

/// Largest page the provider serves in a single call.
pub const PROVIDER_MAX_PAGE_SIZE: u32 = 10_000;

/// Page size the provider uses when no size is requested.
pub const PROVIDER_DEFAULT_PAGE_SIZE: u32 = 100;

/// Default `--max-records` value; equals the provider's pagination ceiling.
pub const DEFAULT_MAX_RECORDS: i64 = 30_000;

/// Default `--max-requests` value (auto).
pub const DEFAULT_MAX_REQUESTS: i64 = -1;

const MAX_PAGE: i64 = PROVIDER_MAX_PAGE_SIZE as i64;

/// Budgeting errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// `max_requests` of zero can never fetch anything.
    #[error("max requests cannot be zero")]
    ZeroRequests,
}

/// Page allocation for one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    page_size: u32,
    page_count: u32,
    total_requested: i64,
}

impl FetchPlan {
    /// Computes the plan for a record target and request budget.
    ///
    /// `max_records <= 0` means unspecified and `max_requests < 0` means
    /// auto. Rules are evaluated in order; the first match wins.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::ZeroRequests`] when `max_requests == 0`.
    pub fn compute(max_records: i64, max_requests: i64) -> Result<Self, PlanError> {
        if max_requests == 0 {
            return Err(PlanError::ZeroRequests);
        }

        let (page_size, page_count) = if max_records <= 0 {
            (PROVIDER_DEFAULT_PAGE_SIZE, 1)
        } else if max_records <= MAX_PAGE || max_requests == 1 {
            (page_size_for(max_records), 1)
        } else if max_requests < 0 && max_records > 2 * MAX_PAGE {
            (PROVIDER_MAX_PAGE_SIZE, 3)
        } else if max_requests < 0 {
            (PROVIDER_MAX_PAGE_SIZE, 2)
        } else if max_requests == 2 && max_records > 2 * MAX_PAGE {
            (PROVIDER_MAX_PAGE_SIZE, 2)
        } else {
            (PROVIDER_MAX_PAGE_SIZE, 3)
        };

        let plan = Self {
            page_size,
            page_count,
            total_requested: max_records,
        };
        info!(
            page_size = plan.page_size,
            page_count = plan.page_count,
            total_requested = plan.total_requested,
            "Request plan computed"
        );
        Ok(plan)
    }

    /// Records requested per page.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of pages to request at most.
    #[must_use]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// The caller's original record target.
    #[must_use]
    pub fn total_requested(&self) -> i64 {
        self.total_requested
    }

    /// Upper bound of records this plan can retrieve.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        u64::from(self.page_size) * u64::from(self.page_count)
    }
}

impl fmt::Display for FetchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Making {} requests for {} records ({} total)",
            self.page_count,
            self.page_size,
            self.capacity()
        )
    }
}

fn page_size_for(max_records: i64) -> u32 {
    u32::try_from(max_records.min(MAX_PAGE)).unwrap_or(PROVIDER_MAX_PAGE_SIZE)
}
