use clap::{Parser, ValueEnum};
use anyhow::Result;
use std::path::PathBuf;
use log::debug;

/// Push notification dispatcher
#[derive(Parser, Debug)]
#[command(name = "pushgate")]
#[command(about = "Feeds push messages through the notification handler and prints every client event as JSON")]
#[command(version)]
pub struct Args {
    /// Newline-delimited JSON messages to read (defaults to stdin)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// How the built-in client answers announced notifications
    #[arg(short, long, value_enum, default_value_t = RespondMode::Show)]
    pub respond: RespondMode,

    /// Response window in milliseconds (overrides configuration)
    #[arg(short, long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL")]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Configuration section name
    #[arg(long, value_name = "SECTION")]
    pub config_name: Option<String>,
}

/// Built-in client behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RespondMode {
    /// Show every notification
    Show,
    /// Suppress every notification
    Suppress,
    /// Never answer; every notification times out
    None,
}

pub fn parse_args() -> Args {
    Args::parse()
}

pub fn validate_args(args: &Args) -> Result<()> {
    debug!("Validating CLI argument combinations");

    let log_flags_count = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|&&flag| flag)
        .count();

    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    match args.log_format.to_lowercase().as_str() {
        "text" | "json" => {},
        _ => return Err(anyhow::anyhow!(
            "Invalid log format '{}'. Valid options: text, json", args.log_format
        )),
    }

    if let Some(ref level) = args.log_file_level {
        match level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {},
            _ => return Err(anyhow::anyhow!(
                "Invalid log file level '{}'. Valid levels: error, warn, info, debug, trace", level
            )),
        }
    }

    if args.log_file_level.is_some() && args.log_file.is_none() {
        return Err(anyhow::anyhow!("--log-file-level requires --log-file"));
    }

    if args.timeout_ms == Some(0) {
        return Err(anyhow::anyhow!("--timeout-ms must be greater than zero"));
    }

    Ok(())
}
