//! Configuration file loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use dehasher_core::OutputFormat;

/// Environment variable that overrides `api_base_url`.
pub const API_URL_ENV: &str = "DEHASHER_API_URL";

/// File-backed defaults for the CLI.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Provider API root.
    pub api_base_url: Option<String>,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Database file used instead of the data-directory default.
    pub db_path: Option<PathBuf>,
    /// SQLite busy timeout in milliseconds.
    pub db_busy_timeout_ms: Option<u32>,
    /// `query --max-records` when the flag is absent.
    pub default_max_records: Option<i64>,
    /// `query --format` when the flag is absent.
    pub default_format: Option<OutputFormat>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        validate_timeout_secs("request_timeout_secs", self.request_timeout_secs)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;

        if let Some(value) = self.db_busy_timeout_ms
            && value > 120_000
        {
            bail!("Invalid config value for `db_busy_timeout_ms`: {value}. Expected range: 0..=120000");
        }

        if let Some(url) = self.api_base_url.as_deref()
            && url::Url::parse(url).is_err()
        {
            bail!("Invalid config value for `api_base_url`: '{url}' is not an absolute URL");
        }

        Ok(())
    }

    /// API root after applying the `DEHASHER_API_URL` override.
    #[must_use]
    pub fn api_base_url_with_env(&self) -> Option<String> {
        env_var_non_empty(API_URL_ENV).or_else(|| self.api_base_url.clone())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed config, or defaults when no file exists.
    pub config: FileConfig,
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/dehasher/config.toml`
/// 2. `$HOME/.config/dehasher/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("dehasher")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("dehasher")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

fn env_var_non_empty(name: &str) -> Option<String> {
    let value = env::var(name).ok()?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "api_base_url" => {
                cfg.api_base_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "request_timeout_secs" => {
                cfg.request_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "db_path" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.db_path = Some(PathBuf::from(parsed));
            }
            "db_busy_timeout_ms" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("db_busy_timeout_ms out of range for u32"))?;
                cfg.db_busy_timeout_ms = Some(n);
            }
            "default_max_records" => {
                cfg.default_max_records = Some(parse_integer_i64(value).with_context(invalid)?);
            }
            "default_format" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                let format = parsed
                    .parse::<OutputFormat>()
                    .with_context(|| format!("{} (expected json, xml, yaml or txt)", invalid()))?;
                cfg.default_format = Some(format);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let value = parse_integer_i128(raw_value)?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_integer_i64(raw_value: &str) -> Result<i64> {
    let value = parse_integer_i128(raw_value)?;
    i64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for i64"))
}

fn parse_integer_i128(raw_value: &str) -> Result<i128> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    Ok(token.parse::<i128>()?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
request_timeout_secs = 60
default_format = "yaml"
"#,
        )
        .unwrap();
        assert_eq!(cfg.request_timeout_secs, Some(60));
        assert_eq!(cfg.default_format, Some(OutputFormat::Yaml));
        assert!(cfg.api_base_url.is_none());
        assert!(cfg.db_path.is_none());
    }

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
api_base_url = "http://127.0.0.1:9000"
request_timeout_secs = 15
connect_timeout_secs = 5
db_path = "/var/lib/dehasher/results.sqlite"
db_busy_timeout_ms = 3000
default_max_records = 500
default_format = "txt"
"#,
        )
        .unwrap();
        assert_eq!(cfg.api_base_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(cfg.connect_timeout_secs, Some(5));
        assert_eq!(
            cfg.db_path,
            Some(PathBuf::from("/var/lib/dehasher/results.sqlite"))
        );
        assert_eq!(cfg.db_busy_timeout_ms, Some(3000));
        assert_eq!(cfg.default_max_records, Some(500));
        assert_eq!(cfg.default_format, Some(OutputFormat::Text));
    }

    #[test]
    fn test_parse_config_accepts_negative_max_records() {
        let cfg = parse_config_str("default_max_records = -1").unwrap();
        assert_eq!(cfg.default_max_records, Some(-1));
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
request_timeout_secs = 45 # slow link
api_base_url = "http://example.test/#fragment" # hash inside quotes is kept
"#,
        )
        .unwrap();
        assert_eq!(cfg.request_timeout_secs, Some(45));
        assert_eq!(
            cfg.api_base_url.as_deref(),
            Some("http://example.test/#fragment")
        );
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout_value() {
        let err = parse_config_str("connect_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("connect_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_db_busy_timeout_ms() {
        let err = parse_config_str("db_busy_timeout_ms = 120001").unwrap_err();
        assert!(err.to_string().contains("db_busy_timeout_ms"));
    }

    #[test]
    fn test_parse_config_rejects_numeric_values_with_trailing_tokens() {
        let err = parse_config_str("request_timeout_secs = 4 trailing").unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = parse_config_str("db_path = /tmp/x.sqlite").unwrap_err();
        assert!(err.to_string().contains("db_path"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_format() {
        let err = parse_config_str(r#"default_format = "csv""#).unwrap_err();
        assert!(err.to_string().contains("default_format"));
    }

    #[test]
    fn test_parse_config_rejects_relative_api_url() {
        let err = parse_config_str(r#"api_base_url = "api.example.test""#).unwrap_err();
        assert!(err.to_string().contains("api_base_url"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("unknown_key = 123").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("unknown_key"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("request_timeout_secs 10").unwrap_err();
        assert!(err.to_string().contains("expected key = value"));
    }
}
