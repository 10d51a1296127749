//! Login/password pairs derived from stored records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// A credential pair lifted out of a record that carries a password.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename = "credential")]
pub struct StoredCredential {
    /// Provider id of the source record.
    pub record_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
}

impl StoredCredential {
    /// Username when present, otherwise the email.
    #[must_use]
    pub fn login(&self) -> &str {
        if self.username.is_empty() {
            &self.email
        } else {
            &self.username
        }
    }

    /// Derives a credential from `record`; `None` without a password.
    #[must_use]
    pub fn from_record(record: &Record) -> Option<Self> {
        let password = record.first_password()?;
        Some(Self {
            record_id: record.id.clone(),
            username: record.first_username().unwrap_or_default().to_string(),
            email: record.first_email().unwrap_or_default().to_string(),
            password: password.to_string(),
        })
    }
}

impl fmt::Display for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.login(), self.password)
    }
}

/// Extracts credentials from every record that has a non-empty password,
/// preserving record order.
#[must_use]
pub fn extract_credentials(records: &[Record]) -> Vec<StoredCredential> {
    records.iter().filter_map(StoredCredential::from_record).collect()
}
