//! Per-user data locations.
//!
//! Everything lives under `$XDG_DATA_HOME/dehasher` (or
//! `~/.local/share/dehasher`).

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use thiserror::Error;

const APP_DIR: &str = "dehasher";
const DB_FILE_NAME: &str = "dehasher.sqlite";
const KEYSTORE_FILE_NAME: &str = "credentials.json";

/// No usable base directory was found in the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unable to determine data directory (set XDG_DATA_HOME or HOME)")]
pub struct DataDirUnavailable;

/// Resolved data locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    /// Resolves paths from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`DataDirUnavailable`] when neither variable is set.
    pub fn from_env() -> Result<Self, DataDirUnavailable> {
        let root = resolve_data_dir(
            sanitize_env_path(env::var_os("XDG_DATA_HOME")),
            sanitize_env_path(env::var_os("HOME")),
        )?;
        Ok(Self { root })
    }

    /// Uses `root` directly as the application data directory.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default SQLite database file.
    #[must_use]
    pub fn database(&self) -> PathBuf {
        self.root.join("db").join(DB_FILE_NAME)
    }

    /// API key store file.
    #[must_use]
    pub fn keystore(&self) -> PathBuf {
        self.root.join("keystore").join(KEYSTORE_FILE_NAME)
    }
}

fn sanitize_env_path(value: Option<OsString>) -> Option<PathBuf> {
    let value = value?;
    if value.to_string_lossy().trim().is_empty() {
        return None;
    }

    Some(PathBuf::from(value))
}

fn resolve_data_dir(
    xdg_data_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Result<PathBuf, DataDirUnavailable> {
    if let Some(xdg) = xdg_data_home {
        return Ok(xdg.join(APP_DIR));
    }
    if let Some(home) = home {
        return Ok(home.join(".local").join("share").join(APP_DIR));
    }

    Err(DataDirUnavailable)
}
