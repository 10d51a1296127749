//! Error types for query construction.

use thiserror::Error;

use super::SearchField;

/// Errors raised while turning user filters into a provider query string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// No filter carried a non-empty value.
    #[error(
        "at least one search field is required\n  Suggestion: Pass one of --username, --email-query, --ip, --domain, --password, --hash, --name"
    )]
    EmptyFilter,

    /// Two match modes were requested at once.
    #[error("{first} matching and {second} matching cannot be combined")]
    ConflictingModes {
        /// First requested mode.
        first: &'static str,
        /// Second requested mode.
        second: &'static str,
    },

    /// Value cannot be used for an exact-match (quoted) search.
    #[error("invalid exact-match value for {field}: {reason}")]
    InvalidExactMatch {
        /// Field carrying the value.
        field: SearchField,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// Value is not a usable regular expression.
    #[error("invalid regex for {field}: {reason}")]
    InvalidRegex {
        /// Field carrying the value.
        field: SearchField,
        /// Compiler or syntax message.
        reason: String,
    },
}
