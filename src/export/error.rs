//! Export error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while rendering or writing an export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The requested format is not one we can write.
    #[error("unsupported output format '{0}'\n  Suggestion: Use one of: json, xml, yaml, txt")]
    UnknownFormat(String),

    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to render XML: {0}")]
    Xml(String),

    /// The output file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
