//! Rendering results to JSON, XML, YAML or plain text, and writing them out.

mod error;

pub use error::ExportError;

use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tracing::{info, instrument};

use crate::record::{Record, RecordField};
use crate::store::StoredCredential;

/// File format for exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Xml,
    Yaml,
    Text,
}

impl OutputFormat {
    /// File extension, without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Yaml => "yaml",
            Self::Text => "txt",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "txt" | "text" => Ok(Self::Text),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Serialize)]
#[serde(rename = "results")]
struct RecordsDocument<'a> {
    result: &'a [Record],
}

#[derive(Serialize)]
#[serde(rename = "credentials")]
struct CredentialsDocument<'a> {
    credential: &'a [StoredCredential],
}

/// Appends the format's extension unless `output` already ends with it.
#[must_use]
pub fn output_path(output: &str, format: OutputFormat) -> PathBuf {
    let suffix = format!(".{}", format.extension());
    if output.to_ascii_lowercase().ends_with(&suffix) {
        PathBuf::from(output)
    } else {
        PathBuf::from(format!("{output}{suffix}"))
    }
}

/// Renders records in `format`.
///
/// # Errors
///
/// Returns the serializer's error for the chosen format.
pub fn render_records(records: &[Record], format: OutputFormat) -> Result<String, ExportError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(records)?),
        OutputFormat::Xml => render_xml(&RecordsDocument { result: records }),
        OutputFormat::Text => Ok(records_text(records)),
    }
}

/// Renders credentials in `format`.
///
/// The text form is one `login:password` line per credential.
///
/// # Errors
///
/// Returns the serializer's error for the chosen format.
pub fn render_credentials(
    credentials: &[StoredCredential],
    format: OutputFormat,
) -> Result<String, ExportError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(credentials)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(credentials)?),
        OutputFormat::Xml => render_xml(&CredentialsDocument {
            credential: credentials,
        }),
        OutputFormat::Text => Ok(credentials
            .iter()
            .map(|credential| format!("{credential}\n"))
            .collect()),
    }
}

/// Renders and writes records to `output` (extension added as needed).
///
/// # Errors
///
/// Returns [`ExportError`] on render or write failure.
#[instrument(skip(records), fields(count = records.len()))]
pub fn write_records(
    records: &[Record],
    format: OutputFormat,
    output: &str,
) -> Result<PathBuf, ExportError> {
    let rendered = render_records(records, format)?;
    write_file(&output_path(output, format), &rendered)
}

/// Renders and writes credentials to `output` (extension added as needed).
///
/// # Errors
///
/// Returns [`ExportError`] on render or write failure.
#[instrument(skip(credentials), fields(count = credentials.len()))]
pub fn write_credentials(
    credentials: &[StoredCredential],
    format: OutputFormat,
    output: &str,
) -> Result<PathBuf, ExportError> {
    let rendered = render_credentials(credentials, format)?;
    write_file(&output_path(output, format), &rendered)
}

fn write_file(path: &Path, contents: &str) -> Result<PathBuf, ExportError> {
    std::fs::write(path, contents).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = contents.len(), "Export written");
    Ok(path.to_path_buf())
}

fn render_xml<T: Serialize>(document: &T) -> Result<String, ExportError> {
    let mut buffer = String::new();
    let mut serializer = quick_xml::se::Serializer::new(&mut buffer);
    serializer.indent(' ', 2);
    document
        .serialize(serializer)
        .map_err(|error| ExportError::Xml(error.to_string()))?;
    buffer.push('\n');
    Ok(buffer)
}

fn records_text(records: &[Record]) -> String {
    let mut out = String::new();
    for record in records {
        let _ = writeln!(out, "Id: {}", record.id);
        for field in RecordField::ALL {
            let values = record.values(field);
            if !values.is_empty() {
                let _ = writeln!(out, "{}: {}", field.label(), values.join(", "));
            }
        }
        out.push('\n');
    }
    out
}
