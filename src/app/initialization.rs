//! Application initialization and configuration

use anyhow::Result;
use std::str::FromStr;
use std::time::Duration;
use log::{debug, LevelFilter};
use crate::{cli, config, logging};
use crate::notifications::HandlerConfig;

pub fn load_configuration(args: &cli::Args) -> Result<config::ConfigManager> {
    let mut manager = if let Some(config_file) = &args.config_file {
        debug!("Loading configuration from explicit file: {}", config_file.display());
        config::ConfigManager::load_from_file(config_file.clone())?
    } else {
        config::ConfigManager::load()?
    };

    if let Some(section_name) = &args.config_name {
        manager.select_section(section_name.clone());
    }

    Ok(manager)
}

pub fn configure_logging(args: &cli::Args, config: &config::ConfigManager) -> Result<logging::LogConfig> {
    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        match config.get_log_level("base", "console-level") {
            Ok(Some(level)) => level,
            Ok(None) => LevelFilter::Info,
            Err(e) => {
                debug!("Invalid console-level in config, using default: {}", e);
                LevelFilter::Info
            }
        }
    };

    let format = if !args.log_format.is_empty() && args.log_format != "text" {
        logging::LogFormat::from_str(&args.log_format)
            .map_err(|e| anyhow::anyhow!(e))?
    } else {
        match config.get_value("base", "log-format") {
            Some(format_str) => logging::LogFormat::from_str(format_str)
                .unwrap_or(logging::LogFormat::Text),
            None => logging::LogFormat::Text,
        }
    };

    let log_file_path = args.log_file.clone()
        .or_else(|| config.get_path("base", "log-file"));

    let file_log_level = match &args.log_file_level {
        Some(level_str) => Some(logging::parse_log_level(level_str)?),
        None => match config.get_log_level("base", "file-log-level") {
            Ok(level) => level,
            Err(e) => {
                debug!("Invalid file-log-level in config, using None: {}", e);
                None
            }
        },
    };

    let (destination, file_level) = match (log_file_path, file_log_level) {
        (Some(file_path), Some(level)) => (logging::LogDestination::Both(file_path), Some(level)),
        (Some(file_path), None) => (logging::LogDestination::Both(file_path), Some(console_level)),
        (None, None) => (logging::LogDestination::Console, None),
        (None, Some(_)) => {
            return Err(anyhow::anyhow!("Log file level specified without log file"));
        }
    };

    Ok(logging::LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}

/// Handler configuration with command line overrides applied
pub fn configure_handler(args: &cli::Args, config: &config::ConfigManager) -> Result<HandlerConfig> {
    let mut handler_config = config.get_handler_config()?;
    if let Some(timeout_ms) = args.timeout_ms {
        handler_config.response_timeout = Duration::from_millis(timeout_ms);
    }
    handler_config.validate()?;
    debug!("Handler configuration: {:?}", handler_config);
    Ok(handler_config)
}
