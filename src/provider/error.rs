//! Error taxonomy for provider API calls.
//!
//! Every variant is fatal for the current invocation; nothing here is retried.

use thiserror::Error;

/// Errors returned by provider endpoints or the transport under them.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 400: the query was malformed or the input invalid.
    #[error(
        "provider rejected the query (HTTP 400)\n  Suggestion: Check field values and escaping, or refresh your API key"
    )]
    InvalidQuery,

    /// HTTP 401: the API key (or key/email pair) was not accepted.
    #[error(
        "invalid API credentials (HTTP 401)\n  Suggestion: Run `dehasher set-key <key>` or pass --key"
    )]
    InvalidCredentials,

    /// HTTP 403: the account has no credits left.
    #[error("insufficient credits (HTTP 403)")]
    InsufficientCredits,

    /// HTTP 404: the endpoint does not accept this method.
    #[error("method not permitted (HTTP 404)")]
    MethodNotPermitted,

    /// HTTP 429: the provider is rate limiting this key.
    #[error("rate limited by provider (HTTP 429)\n  Suggestion: Wait before retrying")]
    RateLimited,

    /// HTTP 302: the provider redirected instead of answering, which it does
    /// for missing or invalid queries.
    #[error("invalid or missing query (HTTP 302)")]
    MissingQuery,

    /// Any other non-success status.
    #[error("an unknown error has occurred (HTTP {status})")]
    Unknown {
        /// Status code returned.
        status: u16,
    },

    /// Transport-level failure (DNS, connect, TLS, body read).
    #[error("network error calling {url}: {source}")]
    Network {
        /// Endpoint called.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Request exceeded the configured timeout.
    #[error("timeout calling {url}")]
    Timeout {
        /// Endpoint called.
        url: String,
    },

    /// Response body was not the expected JSON.
    #[error("could not decode response from {url}: {source}")]
    Decode {
        /// Endpoint called.
        url: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// The configured base URL cannot host provider endpoints.
    #[error("invalid provider base URL '{base}': {reason}")]
    InvalidBaseUrl {
        /// Configured base.
        base: String,
        /// Parse or join failure.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl ProviderError {
    /// Maps a non-success HTTP status to its taxonomy entry.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidQuery,
            401 => Self::InvalidCredentials,
            403 => Self::InsufficientCredits,
            404 => Self::MethodNotPermitted,
            429 => Self::RateLimited,
            302 => Self::MissingQuery,
            status => Self::Unknown { status },
        }
    }

    /// Creates a transport error, classifying timeouts separately.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Returns the HTTP status behind this error, when there is one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidQuery => Some(400),
            Self::InvalidCredentials => Some(401),
            Self::InsufficientCredits => Some(403),
            Self::MethodNotPermitted => Some(404),
            Self::RateLimited => Some(429),
            Self::MissingQuery => Some(302),
            Self::Unknown { status } => Some(*status),
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::Decode { .. }
            | Self::InvalidBaseUrl { .. }
            | Self::ClientBuild(_) => None,
        }
    }
}
