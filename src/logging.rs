// Logging module for pushgate
// Structured logging with timestamp formatting and text or JSON output
//
// - Output formats: Text and JSON
// - Destinations: Console (stderr), File, or Both
// - Independent log levels for console and file output
// - Timestamps formatted as YYYY-MM-DD HH:mm:ss
//
// Example usage:
// ```
// let config = LogConfig {
//     console_level: LevelFilter::Info,
//     file_level: Some(LevelFilter::Debug),
//     format: LogFormat::Json,
//     destination: LogDestination::Both(PathBuf::from("pushgate.log")),
// };
// init_logger(config)?;
// log::info!("Dispatcher started");
// ```

use log::{Level, LevelFilter};
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use anyhow::{Context, Result};

/// Log output format options
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}. Valid options: text, json", s)),
        }
    }
}

/// Log destination options
#[derive(Debug, Clone, PartialEq)]
pub enum LogDestination {
    Console,
    File(PathBuf),
    Both(PathBuf),
}

impl LogDestination {
    fn file_path(&self) -> Option<&PathBuf> {
        match self {
            LogDestination::Console => None,
            LogDestination::File(path) | LogDestination::Both(path) => Some(path),
        }
    }
}

/// JSON log entry structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLogEntry {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub console_level: LevelFilter,
    pub file_level: Option<LevelFilter>,
    pub format: LogFormat,
    pub destination: LogDestination,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_level: LevelFilter::Info,
            file_level: None,
            format: LogFormat::Text,
            destination: LogDestination::Console,
        }
    }
}

/// Custom logger implementation
pub struct PushgateLogger {
    config: LogConfig,
    file: Option<Mutex<File>>,
}

impl PushgateLogger {
    pub fn new(config: LogConfig) -> Result<Self> {
        let file = match config.destination.file_path() {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file: {}", path.display()))?;
                Some(Mutex::new(file))
            }
            None => None,
        };
        Ok(Self { config, file })
    }

    fn format_timestamp() -> String {
        let now: DateTime<Local> = Local::now();
        now.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn format_text_message(&self, level: Level, target: &str, message: &str) -> String {
        format!(
            "{} [{}] {}: {}",
            Self::format_timestamp(),
            level.to_string().to_uppercase(),
            target,
            message
        )
    }

    fn format_json_message(&self, level: Level, target: &str, message: &str) -> Result<String> {
        let entry = JsonLogEntry {
            timestamp: Self::format_timestamp(),
            level: level.to_string().to_uppercase(),
            target: target.to_string(),
            message: message.to_string(),
        };

        serde_json::to_string(&entry)
            .context("Failed to serialize log entry to JSON")
    }

    fn should_log_to_console(&self, level: Level) -> bool {
        !matches!(self.config.destination, LogDestination::File(_))
            && level <= self.config.console_level
    }

    fn should_log_to_file(&self, level: Level) -> bool {
        match self.config.file_level {
            Some(file_level) => self.file.is_some() && level <= file_level,
            None => false,
        }
    }

    fn write_to_console(&self, formatted_message: &str) -> io::Result<()> {
        writeln!(io::stderr(), "{}", formatted_message)
    }

    fn write_to_file(&self, formatted_message: &str) -> io::Result<()> {
        match &self.file {
            Some(file) => writeln!(file.lock(), "{}", formatted_message),
            None => Ok(()),
        }
    }
}

impl log::Log for PushgateLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.should_log_to_console(metadata.level()) ||
        self.should_log_to_file(metadata.level())
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let message = record.args().to_string();
        let level = record.level();
        let target = record.target();

        let formatted_message = match self.config.format {
            LogFormat::Text => self.format_text_message(level, target, &message),
            LogFormat::Json => match self.format_json_message(level, target, &message) {
                Ok(json) => json,
                Err(e) => {
                    eprintln!("JSON formatting error: {}. Falling back to text format.", e);
                    self.format_text_message(level, target, &message)
                }
            },
        };

        if self.should_log_to_console(level) {
            if let Err(e) = self.write_to_console(&formatted_message) {
                eprintln!("Console logging error: {}", e);
            }
        }
        if self.should_log_to_file(level) {
            if let Err(e) = self.write_to_file(&formatted_message) {
                eprintln!("File logging error: {}", e);
            }
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Initialize the logging system with the given configuration
pub fn init_logger(config: LogConfig) -> Result<()> {
    let max_level = match config.file_level {
        Some(file_level) => file_level.max(config.console_level),
        None => config.console_level,
    };
    let logger = PushgateLogger::new(config)?;

    log::set_boxed_logger(Box::new(logger))
        .context("Failed to set global logger")?;

    log::set_max_level(max_level);

    Ok(())
}

/// Convert string to LevelFilter
pub fn parse_log_level(level_str: &str) -> Result<LevelFilter> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(LevelFilter::Error),
        "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        "off" => Ok(LevelFilter::Off),
        _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels: error, warn, info, debug, trace, off", level_str)),
    }
}
