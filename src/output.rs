//! Terminal rendering helpers: progress spinner and stored-result layouts.

use std::fmt::Write as _;
use std::io::IsTerminal;
use std::time::Duration;

use dehasher_core::{PageReport, Record, RecordField};
use indicatif::{ProgressBar, ProgressStyle};

/// Columns shown by `db query` when `--display` is not given.
pub const DEFAULT_TABLE_COLUMNS: [RecordField; 6] = [
    RecordField::Username,
    RecordField::Email,
    RecordField::IpAddress,
    RecordField::Password,
    RecordField::HashedPassword,
    RecordField::Name,
];

/// Spinner shown on stderr while pages are fetched.
///
/// Hidden when stderr is not a terminal or output is quiet.
pub struct FetchSpinner {
    bar: Option<ProgressBar>,
}

impl FetchSpinner {
    pub fn start(enabled: bool) -> Self {
        if !enabled || !std::io::stderr().is_terminal() {
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("Querying...");
        Self { bar: Some(bar) }
    }

    pub fn page(&self, report: &PageReport) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!(
                "Page {}: {} entries ({} total available)",
                report.page, report.entries, report.total
            ));
        }
    }

    pub fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Truncates text to at most `width` chars, ending in `...` if truncated.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let text_len = text.chars().count();
    if text_len <= width {
        return text.to_string();
    }
    if width <= 3 {
        return ".".repeat(width);
    }

    let mut output: String = text.chars().take(width - 3).collect();
    output.push_str("...");
    output
}

/// Fixed table width for a column.
pub fn column_width(field: RecordField) -> usize {
    match field {
        RecordField::Email | RecordField::Address | RecordField::Url => 30,
        RecordField::IpAddress
        | RecordField::LicensePlate
        | RecordField::Phone
        | RecordField::HashType => 15,
        _ => 20,
    }
}

/// Header text for a column.
pub fn column_title(field: RecordField) -> &'static str {
    match field {
        RecordField::Email => "Email",
        RecordField::IpAddress => "IP Address",
        RecordField::Username => "Username",
        RecordField::Password => "Password",
        RecordField::HashedPassword => "Hashed Password",
        RecordField::HashType => "Hash Type",
        RecordField::Name => "Name",
        RecordField::Vin => "VIN",
        RecordField::LicensePlate => "License Plate",
        RecordField::Url => "Domain/URL",
        RecordField::Social => "Social",
        RecordField::CryptocurrencyAddress => "Crypto Address",
        RecordField::Address => "Address",
        RecordField::Phone => "Phone",
        RecordField::Company => "Company",
        RecordField::DatabaseName => "Database",
    }
}

fn joined(record: &Record, field: RecordField) -> String {
    record.values(field).join(", ")
}

/// Renders records as a fixed-width table with a dashed rule under the header.
pub fn render_table(records: &[Record], columns: &[RecordField]) -> String {
    let mut out = String::new();
    let mut header = String::new();
    let mut rule_width = 0;
    for &field in columns {
        let width = column_width(field);
        let _ = write!(header, "{:<width$} ", column_title(field));
        rule_width += width + 1;
    }
    let _ = writeln!(out, "{}", header.trim_end());
    let _ = writeln!(out, "{}", "-".repeat(rule_width.saturating_sub(1)));

    for record in records {
        let mut row = String::new();
        for &field in columns {
            let width = column_width(field);
            let cell = truncate_to_width(&joined(record, field), width);
            let _ = write!(row, "{cell:<width$} ");
        }
        let _ = writeln!(out, "{}", row.trim_end());
    }
    out
}

/// Renders each record as a numbered block of `Field: value` lines.
///
/// Empty fields are left out.
pub fn render_simple(records: &[Record], columns: &[RecordField]) -> String {
    let mut out = String::new();
    for (index, record) in records.iter().enumerate() {
        let _ = writeln!(out, "Result {}:", index + 1);
        for &field in columns {
            let value = joined(record, field);
            if !value.is_empty() {
                let _ = writeln!(out, "  {}: {value}", column_title(field));
            }
        }
        out.push('\n');
    }
    out
}
