//! Read-side filters over the `results` table.

use sqlx::{QueryBuilder, Sqlite};

use crate::record::RecordField;

/// Rows returned when no limit is given.
pub const DEFAULT_QUERY_LIMIT: i64 = 100;

/// Filter set for reading stored records.
///
/// Filters are AND-ed. Multi-valued columns match when any element matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    filters: Vec<(RecordField, String)>,
    non_empty: Vec<RecordField>,
    /// `=` instead of substring `LIKE`.
    pub exact: bool,
    /// Maximum rows; non-positive means [`DEFAULT_QUERY_LIMIT`].
    pub limit: i64,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            non_empty: Vec::new(),
            exact: false,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl RecordQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value filter; blank values are ignored.
    #[must_use]
    pub fn filter(mut self, field: RecordField, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.filters.push((field, value.trim().to_string()));
        }
        self
    }

    /// Requires `field` to hold at least one value.
    #[must_use]
    pub fn non_empty(mut self, field: RecordField) -> Self {
        if !self.non_empty.contains(&field) {
            self.non_empty.push(field);
        }
        self
    }

    #[must_use]
    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// True when neither value filters nor non-empty constraints are set.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.filters.is_empty() && self.non_empty.is_empty()
    }

    pub(crate) fn effective_limit(&self) -> i64 {
        if self.limit > 0 {
            self.limit
        } else {
            DEFAULT_QUERY_LIMIT
        }
    }

    /// Appends ` WHERE ...` for this query (nothing when unconstrained).
    pub(crate) fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        let mut separated = " WHERE ";
        for (field, value) in &self.filters {
            builder.push(separated);
            separated = " AND ";
            self.push_match(builder, *field, value);
        }
        for field in &self.non_empty {
            builder.push(separated);
            separated = " AND ";
            if field.is_multi_valued() {
                builder.push(format!("json_array_length(results.{}) > 0", field.column()));
            } else {
                builder.push(format!("results.{} <> ''", field.column()));
            }
        }
    }

    fn push_match(&self, builder: &mut QueryBuilder<'_, Sqlite>, field: RecordField, value: &str) {
        let column = field.column();
        let target = if field.is_multi_valued() {
            builder.push(format!(
                "EXISTS (SELECT 1 FROM json_each(results.{column}) AS item WHERE item.value"
            ));
            ")"
        } else {
            builder.push(format!("results.{column}"));
            ""
        };

        if self.exact {
            builder.push(" = ").push_bind(value.to_string());
        } else {
            builder
                .push(" LIKE ")
                .push_bind(format!("%{}%", escape_like(value)))
                .push(" ESCAPE '\\'");
        }
        builder.push(target);
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn where_sql(query: &RecordQuery) -> String {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT 1 FROM results");
        query.push_where(&mut builder);
        builder.sql().to_string()
    }

    #[test]
    fn test_unconstrained_query_has_no_where() {
        let query = RecordQuery::new().filter(RecordField::Email, "   ");
        assert!(query.is_unconstrained());
        assert_eq!(where_sql(&query), "SELECT 1 FROM results");
    }

    #[test]
    fn test_multi_valued_filter_uses_json_each() {
        let sql = where_sql(&RecordQuery::new().filter(RecordField::Email, "alice"));
        assert!(sql.contains("json_each(results.email)"));
        assert!(sql.contains("LIKE"));
        assert!(sql.contains("ESCAPE"));
    }

    #[test]
    fn test_exact_scalar_filter_uses_equality() {
        let sql = where_sql(
            &RecordQuery::new()
                .filter(RecordField::DatabaseName, "breach")
                .exact(true),
        );
        assert!(sql.contains("results.database_name = "));
        assert!(!sql.contains("LIKE"));
    }

    #[test]
    fn test_non_empty_and_filters_are_joined_with_and() {
        let sql = where_sql(
            &RecordQuery::new()
                .filter(RecordField::Username, "bob")
                .non_empty(RecordField::Password)
                .non_empty(RecordField::HashType),
        );
        assert_eq!(sql.matches(" AND ").count(), 2);
        assert!(sql.contains("json_array_length(results.password) > 0"));
        assert!(sql.contains("results.hash_type <> ''"));
    }

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_effective_limit_defaults() {
        assert_eq!(RecordQuery::new().limit(0).effective_limit(), 100);
        assert_eq!(RecordQuery::new().limit(7).effective_limit(), 7);
    }
}
