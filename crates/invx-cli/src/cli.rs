//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "invx",
    version,
    about = "Invoice field extraction and dynamic field mapping",
    long_about = "Extract fields from OCR'd invoices and map them onto target fields.\n\n\
                  Extraction rules score every value and route it to a review type.\n\
                  Mapping rules come from scoped configs (global, company, format)\n\
                  kept as JSON files in a config directory."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Include extracted field values in logs (redacted by default).
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,

    /// Settings file (default: ./invx.toml when present).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Extract and score fields from a document.
    Extract(ExtractArgs),

    /// Identify the company that issued a document.
    Identify(IdentifyArgs),

    /// Map extracted fields onto target fields using stored configs.
    Map(MapArgs),

    /// Check every stored mapping config.
    Validate(ValidateArgs),
}

impl Command {
    /// Whether the command uses the settings file. Only these commands fail
    /// on a malformed one.
    pub fn reads_settings(&self) -> bool {
        matches!(self, Self::Map(_) | Self::Validate(_))
    }
}

#[derive(Parser)]
pub struct ExtractArgs {
    /// OCR text of the document.
    #[arg(long = "text", value_name = "FILE")]
    pub text: PathBuf,

    /// Extraction rules (JSON array).
    #[arg(long = "rules", value_name = "FILE")]
    pub rules: PathBuf,

    /// Vendor-structured fields (JSON object keyed by field name).
    #[arg(long = "vendor", value_name = "FILE")]
    pub vendor: Option<PathBuf>,

    /// Page layout (JSON array of pages with positioned lines).
    #[arg(long = "layout", value_name = "FILE")]
    pub layout: Option<PathBuf>,

    /// Company the document belongs to; enables its company-specific rules.
    #[arg(long = "company", value_name = "ID")]
    pub company: Option<String>,

    /// Print JSON instead of a table.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Parser)]
pub struct IdentifyArgs {
    /// OCR text of the document.
    #[arg(long = "text", value_name = "FILE")]
    pub text: PathBuf,

    /// Company patterns (JSON array).
    #[arg(long = "patterns", value_name = "FILE")]
    pub patterns: PathBuf,

    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Parser)]
pub struct MapArgs {
    /// Extracted field values (JSON array).
    #[arg(long = "candidates", value_name = "FILE")]
    pub candidates: PathBuf,

    /// Config directory (overrides the settings file).
    #[arg(long = "store", value_name = "DIR")]
    pub store: Option<PathBuf>,

    #[arg(long = "company", value_name = "ID")]
    pub company: Option<String>,

    /// Document format id.
    #[arg(long = "format", value_name = "ID")]
    pub format: Option<String>,

    #[arg(long = "document-id", value_name = "ID")]
    pub document_id: Option<String>,

    /// Bypass the config cache.
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// Config directory (overrides the settings file).
    #[arg(long = "store", value_name = "DIR")]
    pub store: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
