//! Local storage for the provider API key and account email.
//!
//! The file is plain JSON restricted to the owner (`0600` on unix).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors for key store operations.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// Filesystem I/O failed.
    #[error("key store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Stored JSON is malformed.
    #[error("key store at {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode key store: {0}")]
    Encode(#[source] serde_json::Error),
    /// An empty value was given to `set-key`/`set-email`.
    #[error("{0} cannot be empty")]
    EmptyValue(&'static str),
}

/// Persisted credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_email: Option<String>,
}

/// File-backed key store.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads stored keys; a missing file yields empty keys.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError`] when the file cannot be read or parsed.
    pub fn load(&self) -> Result<StoredKeys, KeyStoreError> {
        if !self.path.exists() {
            return Ok(StoredKeys::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        serde_json::from_str(&raw).map_err(|source| KeyStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Stores the API key, keeping any stored email.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError`] on empty input or write failure.
    #[instrument(skip(self, key))]
    pub fn set_key(&self, key: &str) -> Result<(), KeyStoreError> {
        let key = non_empty(key, "API key")?;
        let mut keys = self.load()?;
        keys.api_key = Some(key);
        self.save(&keys)
    }

    /// Stores the account email, keeping any stored key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError`] on empty input or write failure.
    #[instrument(skip(self))]
    pub fn set_email(&self, email: &str) -> Result<(), KeyStoreError> {
        let email = non_empty(email, "email")?;
        let mut keys = self.load()?;
        keys.api_email = Some(email);
        self.save(&keys)
    }

    fn save(&self, keys: &StoredKeys) -> Result<(), KeyStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let payload = serde_json::to_vec_pretty(keys).map_err(KeyStoreError::Encode)?;
        fs::write(&self.path, payload).map_err(|source| self.io_error(source))?;
        set_owner_only_permissions(&self.path).map_err(|source| self.io_error(source))?;
        debug!(path = %self.path.display(), "Key store updated");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> KeyStoreError {
        KeyStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn non_empty(value: &str, label: &'static str) -> Result<String, KeyStoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(KeyStoreError::EmptyValue(label))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
