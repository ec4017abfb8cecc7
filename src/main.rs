use anyhow::Result;
use std::process;
use log::error;
use pushgate::{app, cli, logging};

fn main() {
    // Set up panic handler with better error reporting
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Application panicked: {}", panic_info);
        eprintln!("Panic: {}", panic_info);
    }));

    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::args::parse_args();

    cli::args::validate_args(&args)?;

    let config_manager = app::load_configuration(&args)?;

    let log_config = app::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;

    if let Some(path) = config_manager.config_file_path() {
        log::debug!("Using configuration file {}", path.display());
    }

    // Timers and client responses run on worker threads while stdin is read on a blocking thread
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(app::run(args, config_manager))
}
