//! Provider query construction.
//!
//! Turns a set of per-field filters into the provider's field-qualified
//! query language (`username:alice&email:bob@example.com`).
//!
//! # Rules
//!
//! - Values are trimmed; empty values produce no clause.
//! - Reserved characters are backslash-escaped exactly once, before any
//!   quoting or regex wrapping.
//! - Clauses are emitted in [`SearchField`] declaration order, never in map
//!   iteration order.
//!
//! # Example
//!
//! ```
//! use dehasher_core::query::{MatchMode, SearchField, SearchFilter};
//!
//! let mut filter = SearchFilter::new();
//! filter.insert(SearchField::Username, "alice");
//! filter.insert(SearchField::Email, "a+b@example.com");
//!
//! let query = filter.build(MatchMode::Plain, true).unwrap();
//! assert_eq!(query, r"username:alice&email:a\+b@example.com");
//! ```

mod error;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use error::QueryError;

/// Characters that act as operators in the provider query language.
///
/// Multi-character operators (`&&`, `||`) are covered by escaping each
/// of their characters.
const RESERVED_CHARS: &[char] = &[
    '+', '-', '=', '&', '|', '>', '<', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*',
    '?', ':', '\\',
];

/// Wildcard operators left unescaped in wildcard mode.
const WILDCARD_CHARS: &[char] = &['*', '?'];

/// Joiner placed between field clauses.
const CLAUSE_SEPARATOR: &str = "&";

/// Searchable provider field.
///
/// Variant order is the clause order in built queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Username,
    Email,
    IpAddress,
    Password,
    HashedPassword,
    Name,
    Domain,
    Vin,
    LicensePlate,
    Address,
    Phone,
    Social,
    #[serde(rename = "cryptocurrency_address")]
    CryptoAddress,
}

impl SearchField {
    /// Every field in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Username,
        Self::Email,
        Self::IpAddress,
        Self::Password,
        Self::HashedPassword,
        Self::Name,
        Self::Domain,
        Self::Vin,
        Self::LicensePlate,
        Self::Address,
        Self::Phone,
        Self::Social,
        Self::CryptoAddress,
    ];

    /// Returns the provider's field name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::IpAddress => "ip_address",
            Self::Password => "password",
            Self::HashedPassword => "hashed_password",
            Self::Name => "name",
            Self::Domain => "domain",
            Self::Vin => "vin",
            Self::LicensePlate => "license_plate",
            Self::Address => "address",
            Self::Phone => "phone",
            Self::Social => "social",
            Self::CryptoAddress => "cryptocurrency_address",
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How filter values are formatted before being sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Escaped value, provider default matching.
    #[default]
    Plain,
    /// Escaped value wrapped in double quotes.
    Exact,
    /// Raw value wrapped in forward slashes.
    Regex,
    /// Escaped value with `*` and `?` left as operators.
    Wildcard,
}

impl MatchMode {
    /// Resolves the mode from CLI-style flags.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ConflictingModes`] when more than one flag is set.
    pub fn from_flags(exact: bool, regex: bool, wildcard: bool) -> Result<Self, QueryError> {
        match (exact, regex, wildcard) {
            (false, false, false) => Ok(Self::Plain),
            (true, false, false) => Ok(Self::Exact),
            (false, true, false) => Ok(Self::Regex),
            (false, false, true) => Ok(Self::Wildcard),
            (true, true, _) => Err(QueryError::ConflictingModes {
                first: "exact",
                second: "regex",
            }),
            (true, false, true) => Err(QueryError::ConflictingModes {
                first: "exact",
                second: "wildcard",
            }),
            (false, true, true) => Err(QueryError::ConflictingModes {
                first: "regex",
                second: "wildcard",
            }),
        }
    }

    /// Whether the provider request should carry `regex: true`.
    #[must_use]
    pub fn is_regex(self) -> bool {
        self == Self::Regex
    }

    /// Whether the provider request should carry `wildcard: true`.
    #[must_use]
    pub fn is_wildcard(self) -> bool {
        self == Self::Wildcard
    }

    /// Returns the mode label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Exact => "exact",
            Self::Regex => "regex",
            Self::Wildcard => "wildcard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FilterValue {
    text: String,
    preformatted: bool,
}

/// Field filters for one search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    values: BTreeMap<SearchField, FilterValue>,
}

impl SearchFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field value. Blank values are ignored.
    pub fn insert(&mut self, field: SearchField, value: impl Into<String>) {
        self.insert_value(field, value.into(), false);
    }

    /// Sets a field value that is already in provider syntax.
    ///
    /// The value bypasses escaping and mode wrapping.
    pub fn insert_preformatted(&mut self, field: SearchField, value: impl Into<String>) {
        self.insert_value(field, value.into(), true);
    }

    /// Sets a field from an optional CLI value.
    pub fn insert_opt(&mut self, field: SearchField, value: Option<&str>) {
        if let Some(value) = value {
            self.insert(field, value);
        }
    }

    fn insert_value(&mut self, field: SearchField, value: String, preformatted: bool) {
        let text = value.trim().to_string();
        if text.is_empty() {
            self.values.remove(&field);
            return;
        }
        self.values.insert(field, FilterValue { text, preformatted });
    }

    /// Returns the trimmed value stored for a field.
    #[must_use]
    pub fn get(&self, field: SearchField) -> Option<&str> {
        self.values.get(&field).map(|value| value.text.as_str())
    }

    /// Returns true when no field carries a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of populated fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Builds the provider query string.
    ///
    /// When `hash_passwords` is true a password filter is sent as the
    /// lower-case hex SHA-256 of its value under `hashed_password`. A hash
    /// filter set alongside it is kept, so both `hashed_password` clauses
    /// are sent.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptyFilter`] when nothing is set, or a
    /// validation error for values the selected mode cannot carry.
    pub fn build(&self, mode: MatchMode, hash_passwords: bool) -> Result<String, QueryError> {
        if self.values.is_empty() {
            return Err(QueryError::EmptyFilter);
        }

        let mut clauses = Vec::with_capacity(self.values.len());
        for (&field, value) in &self.values {
            if field == SearchField::Password && hash_passwords {
                clauses.push(clause(SearchField::HashedPassword, &sha256_hex(&value.text)));
                continue;
            }
            let formatted = if value.preformatted {
                value.text.clone()
            } else {
                format_value(field, &value.text, mode)?
            };
            clauses.push(clause(field, &formatted));
        }

        Ok(clauses.join(CLAUSE_SEPARATOR))
    }
}

fn clause(field: SearchField, value: &str) -> String {
    format!("{}:{value}", field.as_str())
}

fn format_value(field: SearchField, value: &str, mode: MatchMode) -> Result<String, QueryError> {
    match mode {
        MatchMode::Plain => Ok(escape_reserved(value)),
        MatchMode::Wildcard => Ok(escape_reserved_except(value, WILDCARD_CHARS)),
        MatchMode::Exact => {
            validate_exact_value(field, value)?;
            Ok(format!("\"{}\"", escape_reserved(value)))
        }
        MatchMode::Regex => {
            validate_regex_value(field, value)?;
            Ok(format!("/{value}/"))
        }
    }
}

/// Backslash-escapes every reserved query character.
#[must_use]
pub fn escape_reserved(value: &str) -> String {
    escape_reserved_except(value, &[])
}

fn escape_reserved_except(value: &str, keep: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if RESERVED_CHARS.contains(&ch) && !keep.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Checks that a value can be carried inside a quoted exact-match clause.
///
/// # Errors
///
/// Returns [`QueryError::InvalidExactMatch`] for quotes or control characters.
pub fn validate_exact_value(field: SearchField, value: &str) -> Result<(), QueryError> {
    if value.trim().is_empty() {
        return Err(QueryError::InvalidExactMatch {
            field,
            reason: "value is empty",
        });
    }
    if value.contains('"') {
        return Err(QueryError::InvalidExactMatch {
            field,
            reason: "value contains a double quote",
        });
    }
    if value.chars().any(char::is_control) {
        return Err(QueryError::InvalidExactMatch {
            field,
            reason: "value contains a control character",
        });
    }
    Ok(())
}

/// Checks that a value is a usable slash-delimited regex body.
///
/// # Errors
///
/// Returns [`QueryError::InvalidRegex`] for unescaped `/` or patterns that do
/// not compile.
pub fn validate_regex_value(field: SearchField, value: &str) -> Result<(), QueryError> {
    let mut previous_backslash = false;
    for ch in value.chars() {
        if ch == '/' && !previous_backslash {
            return Err(QueryError::InvalidRegex {
                field,
                reason: "unescaped '/' would end the pattern early".to_string(),
            });
        }
        previous_backslash = ch == '\\' && !previous_backslash;
    }

    regex::Regex::new(value).map_err(|error| QueryError::InvalidRegex {
        field,
        reason: error.to_string(),
    })?;
    Ok(())
}

fn sha256_hex(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    format!("{digest:x}")
}
