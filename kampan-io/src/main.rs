//! KampanIO - vibration telemetry daemon
//!
//! ## Runtime Architecture
//!
//! - **Main thread**: reactor running the acquisition timer and executing
//!   remote commands between cycles
//! - **command-server thread**: TCP listener forwarding length-prefixed JSON
//!   commands to the reactor
//!
//! SIGINT and SIGTERM request a graceful shutdown, as does the
//! `haltApplication` command.

use kampan_io::config::{AppConfig, DEFAULT_CONFIG_PATH, LoggingConfig};
use kampan_io::reactor::ShutdownFlag;
use kampan_io::{Error, KampanApp, Result};
use std::env;
use std::process::ExitCode;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `kampan-io <path>` (positional)
/// - `kampan-io --config <path>` (flag-based)
/// - `kampan-io -c <path>` (short flag)
///
/// Defaults to `/etc/kampan.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    DEFAULT_CONFIG_PATH.to_string()
}

fn init_logging(logging: &LoggingConfig) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&logging.level));
    if logging.output == "stderr" {
        builder.target(env_logger::Target::Stderr);
    } else {
        builder.target(env_logger::Target::Stdout);
    }
    builder.init();
}

fn run(config: AppConfig) -> Result<()> {
    let shutdown = ShutdownFlag::new();
    let signal_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        signal_flag.request();
    })
    .map_err(|e| Error::Initialization(format!("Error setting signal handler: {}", e)))?;

    let mut app = KampanApp::new(&config, shutdown)?;
    app.run()
}

fn main() -> ExitCode {
    let config_path = parse_config_path();
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .init();
            log::error!("Failed to load {}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging);
    log::info!("KampanIO v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_path);

    match run(config) {
        Ok(()) => {
            log::info!("KampanIO stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("KampanIO failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
