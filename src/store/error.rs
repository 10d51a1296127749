//! Error types for result store operations.

use std::fmt;

use thiserror::Error;

/// Structured classification for store/database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDbErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// Constraint failure (unique/check/not-null).
    ConstraintViolation,
    /// Anything else, including pool and IO failures.
    Other,
}

impl StoreDbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StoreDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> StoreDbErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return StoreDbErrorKind::BusyOrLocked;
    }

    if database_error.is_unique_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return StoreDbErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked") || message.contains("database is busy") {
        return StoreDbErrorKind::BusyOrLocked;
    }
    if message.contains("constraint failed") {
        return StoreDbErrorKind::ConstraintViolation;
    }

    StoreDbErrorKind::Other
}

/// Errors that can occur during store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        kind: StoreDbErrorKind,
        message: String,
    },

    /// A multi-valued field could not be encoded as JSON.
    #[error("failed to encode column {column}: {message}")]
    Encode {
        column: &'static str,
        message: String,
    },

    /// A stored JSON array could not be decoded.
    #[error(
        "failed to decode column {column}: {message}\n  Suggestion: The database may have been edited by another tool"
    )]
    Decode {
        column: &'static str,
        message: String,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: StoreDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl StoreError {
    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<StoreDbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::Encode { .. } | Self::Decode { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_database_message() {
        let err = StoreError::Database {
            kind: StoreDbErrorKind::ConstraintViolation,
            message: "CHECK constraint failed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("database error"));
        assert!(msg.contains("constraint_violation"));
        assert_eq!(
            err.database_kind(),
            Some(StoreDbErrorKind::ConstraintViolation)
        );
    }

    #[test]
    fn test_store_error_from_pool_closed_is_other() {
        let err = StoreError::from(sqlx::Error::PoolClosed);
        assert_eq!(err.database_kind(), Some(StoreDbErrorKind::Other));
        assert!(err.to_string().contains("(other)"));
    }

    #[test]
    fn test_decode_error_has_no_database_kind() {
        let err = StoreError::Decode {
            column: "email",
            message: "expected array".to_string(),
        };
        assert!(err.to_string().contains("Suggestion"));
        assert_eq!(err.database_kind(), None);
    }
}
