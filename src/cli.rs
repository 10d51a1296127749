//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use dehasher_core::fetch::DEFAULT_MAX_REQUESTS;
use dehasher_core::provider::ReverseWhoisType;
use dehasher_core::store::DEFAULT_QUERY_LIMIT;
use dehasher_core::{OutputFormat, RecordField};

/// Query breach-data search APIs, keep results locally, and export them.
#[derive(Parser, Debug)]
#[command(name = "dehasher")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// API key (overrides the stored key)
    #[arg(short = 'k', long, global = true)]
    pub key: Option<String>,

    /// Account email sent with the API key (overrides the stored email)
    #[arg(short = 'e', long, global = true)]
    pub email: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the provider and store/export the results
    Query(QueryArgs),

    /// Work with locally stored results
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },

    /// WHOIS lookups and reverse searches
    Whois(WhoisArgs),

    /// Store the API key
    SetKey {
        /// API key
        #[arg(id = "api_key", value_name = "KEY")]
        key: String,
    },

    /// Store the account email used with the API key
    SetEmail {
        /// Account email
        #[arg(id = "api_email", value_name = "EMAIL")]
        email: String,
    },
}

/// Per-field search values shared by `query` and `db`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FieldArgs {
    /// Username
    #[arg(short = 'U', long)]
    pub username: Option<String>,

    /// Email address
    #[arg(id = "email_query", short = 'E', long = "email-query")]
    pub email: Option<String>,

    /// IP address
    #[arg(short = 'I', long)]
    pub ip: Option<String>,

    /// Domain
    #[arg(short = 'D', long)]
    pub domain: Option<String>,

    /// Password
    #[arg(short = 'P', long)]
    pub password: Option<String>,

    /// Password hash
    #[arg(short = 'Q', long)]
    pub hash: Option<String>,

    /// Name
    #[arg(short = 'N', long)]
    pub name: Option<String>,

    /// Vehicle identification number
    #[arg(long)]
    pub vin: Option<String>,

    /// License plate
    #[arg(long)]
    pub license_plate: Option<String>,

    /// Street address
    #[arg(long)]
    pub address: Option<String>,

    /// Phone number
    #[arg(long)]
    pub phone: Option<String>,

    /// Social handle
    #[arg(long)]
    pub social: Option<String>,

    /// Cryptocurrency address
    #[arg(long)]
    pub crypto: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct QueryArgs {
    /// Maximum records to retrieve (default 30000, or `default_max_records` from config)
    #[arg(short = 'm', long, allow_negative_numbers = true)]
    pub max_records: Option<i64>,

    /// Maximum requests to issue (-1 for as many as the record budget needs)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_REQUESTS, allow_negative_numbers = true)]
    pub max_requests: i64,

    /// First page to request
    #[arg(long, default_value_t = 1)]
    pub starting_page: u32,

    /// Print the remaining account balance
    #[arg(short = 'B', long)]
    pub print_balance: bool,

    /// Match values exactly
    #[arg(short = 'X', long, conflicts_with_all = ["regex_match", "wildcard_match"])]
    pub exact_match: bool,

    /// Treat values as regular expressions
    #[arg(short = 'R', long, conflicts_with = "wildcard_match")]
    pub regex_match: bool,

    /// Treat `*` and `?` as wildcards
    #[arg(short = 'W', long)]
    pub wildcard_match: bool,

    /// Export only login:password pairs
    #[arg(short = 'C', long)]
    pub creds_only: bool,

    /// Output format: json, xml, yaml or txt (default json, or `default_format` from config)
    #[arg(short = 'f', long)]
    pub format: Option<OutputFormat>,

    /// Output file, without extension
    #[arg(short = 'o', long, default_value = dehasher_core::dehasher::DEFAULT_OUTPUT_FILE)]
    pub output: String,

    /// Send the password filter as typed instead of as a SHA-256 hash
    #[arg(long)]
    pub plaintext_password: bool,

    #[command(flatten)]
    pub fields: FieldArgs,
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Show stored results
    Query(DbQueryArgs),
    /// Write stored results to a file
    Export(DbExportArgs),
}

/// Filters over the local store.
#[derive(clap::Args, Debug, Clone)]
pub struct DbFilterArgs {
    /// Database file (defaults to the data directory)
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[command(flatten)]
    pub fields: FieldArgs,

    /// Maximum rows to return
    #[arg(short = 'l', long, default_value_t = DEFAULT_QUERY_LIMIT)]
    pub limit: i64,

    /// Match values exactly instead of by substring
    #[arg(short = 'x', long)]
    pub exact: bool,

    /// Only rows where these fields hold a value (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub non_empty: Vec<RecordField>,
}

/// Terminal layout for `db query`.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayFormat {
    #[default]
    Table,
    Json,
    Simple,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DbQueryArgs {
    #[command(flatten)]
    pub filters: DbFilterArgs,

    /// Output layout
    #[arg(short = 'f', long, value_enum, default_value_t = DisplayFormat::Table)]
    pub format: DisplayFormat,

    /// Columns to show (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub display: Vec<RecordField>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DbExportArgs {
    #[command(flatten)]
    pub filters: DbFilterArgs,

    /// Output format: json, xml, yaml or txt
    #[arg(short = 'f', long, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Output file, without extension
    #[arg(short = 'o', long, default_value = "dehasher_export")]
    pub output: String,

    /// Export only login:password pairs
    #[arg(long)]
    pub creds_only: bool,
}

#[derive(clap::Args, Debug, Clone)]
#[command(group(
    clap::ArgGroup::new("target")
        .required(true)
        .args(["domain", "ip", "mx", "ns", "include", "credits"]),
))]
pub struct WhoisArgs {
    /// Domain lookup, history and subdomain scan
    #[arg(short = 'd', long)]
    pub domain: Option<String>,

    /// Reverse IP lookup
    #[arg(short = 'i', long)]
    pub ip: Option<String>,

    /// Reverse MX lookup
    #[arg(short = 'm', long)]
    pub mx: Option<String>,

    /// Reverse NS lookup
    #[arg(short = 'n', long)]
    pub ns: Option<String>,

    /// Reverse WHOIS include terms (comma-separated)
    #[arg(short = 'I', long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Reverse WHOIS exclude terms (comma-separated)
    #[arg(short = 'E', long, value_delimiter = ',', requires = "include")]
    pub exclude: Vec<String>,

    /// Reverse WHOIS match type
    #[arg(short = 't', long = "type", default_value_t = ReverseWhoisType::Registrant)]
    pub reverse_type: ReverseWhoisType,

    /// Show remaining WHOIS credits
    #[arg(short = 'c', long)]
    pub credits: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    fn query_args(argv: &[&str]) -> QueryArgs {
        let mut full = vec!["dehasher", "query"];
        full.extend_from_slice(argv);
        match Args::try_parse_from(full).unwrap().command {
            Command::Query(args) => args,
            other => panic!("expected query, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Args::try_parse_from(["dehasher"]).is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["dehasher", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["dehasher", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["dehasher", "query", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let args =
            Args::try_parse_from(["dehasher", "query", "-U", "alice", "-vv", "-k", "abc"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.key.as_deref(), Some("abc"));
        assert!(!args.quiet);
    }

    #[test]
    fn test_query_defaults() {
        let args = query_args(&["-U", "alice"]);
        assert_eq!(args.max_records, None);
        assert_eq!(args.max_requests, -1);
        assert_eq!(args.starting_page, 1);
        assert_eq!(args.format, None);
        assert_eq!(args.output, "query");
        assert!(!args.creds_only);
        assert_eq!(args.fields.username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_query_negative_numbers() {
        let args = query_args(&["-m", "-5", "-r", "-1", "-E", "a@example.com"]);
        assert_eq!(args.max_records, Some(-5));
        assert_eq!(args.max_requests, -1);
        assert_eq!(args.fields.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_query_format_parses_aliases() {
        assert_eq!(query_args(&["-f", "yml"]).format, Some(OutputFormat::Yaml));
        assert_eq!(query_args(&["-f", "txt"]).format, Some(OutputFormat::Text));
        let err = Args::try_parse_from(["dehasher", "query", "-f", "csv"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_query_match_flags_conflict() {
        let err = Args::try_parse_from(["dehasher", "query", "-X", "-R"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
        let err = Args::try_parse_from(["dehasher", "query", "-R", "-W"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_db_query_lists_and_defaults() {
        let args = Args::try_parse_from([
            "dehasher",
            "db",
            "query",
            "-U",
            "alice",
            "--non-empty",
            "password,email",
            "--display",
            "username,ip",
        ])
        .unwrap();
        let Command::Db {
            command: DbCommand::Query(query),
        } = args.command
        else {
            panic!("expected db query");
        };
        assert_eq!(query.format, DisplayFormat::Table);
        assert_eq!(query.filters.limit, 100);
        assert_eq!(
            query.filters.non_empty,
            vec![RecordField::Password, RecordField::Email]
        );
        assert_eq!(
            query.display,
            vec![RecordField::Username, RecordField::IpAddress]
        );
    }

    #[test]
    fn test_db_query_rejects_unknown_field() {
        let err =
            Args::try_parse_from(["dehasher", "db", "query", "--display", "shoe_size"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_db_export_defaults() {
        let args = Args::try_parse_from(["dehasher", "db", "export", "-D", "example.com"]).unwrap();
        let Command::Db {
            command: DbCommand::Export(export),
        } = args.command
        else {
            panic!("expected db export");
        };
        assert_eq!(export.format, OutputFormat::Json);
        assert_eq!(export.output, "dehasher_export");
        assert!(!export.creds_only);
        assert_eq!(export.filters.fields.domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_whois_requires_a_target() {
        let err = Args::try_parse_from(["dehasher", "whois"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_whois_targets_are_exclusive() {
        let err =
            Args::try_parse_from(["dehasher", "whois", "-d", "a.com", "-i", "1.1.1.1"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_whois_reverse_terms() {
        let args = Args::try_parse_from([
            "dehasher", "whois", "-I", "acme,widgets", "-E", "test", "-t", "email",
        ])
        .unwrap();
        let Command::Whois(whois) = args.command else {
            panic!("expected whois");
        };
        assert_eq!(whois.include, vec!["acme", "widgets"]);
        assert_eq!(whois.exclude, vec!["test"]);
        assert_eq!(whois.reverse_type, ReverseWhoisType::Email);
    }

    #[test]
    fn test_set_key_takes_positional() {
        let args = Args::try_parse_from(["dehasher", "set-key", "abc123"]).unwrap();
        assert!(matches!(args.command, Command::SetKey { key } if key == "abc123"));
    }
}
