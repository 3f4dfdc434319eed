use anyhow::Result;
use aria2_capture::{
    app::{config::Config, state::AppState},
    cli::{self, Cli, Commands},
};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first to get verbose flag
    let cli = Cli::parse();

    // Set config directory override before anything resolves paths
    if let Some(ref config_dir) = cli.config {
        aria2_capture::util::paths::set_config_dir_override(Some(config_dir.clone()));
    }

    // Get logs directory (creates if needed)
    let logs_dir =
        aria2_capture::util::paths::get_logs_dir().unwrap_or_else(|_| PathBuf::from("logs"));
    std::fs::create_dir_all(&logs_dir).ok();

    // Set up daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "app.jsonl");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins; otherwise INFO, or TRACE with --verbose
    let default_level = if cli.verbose { "trace" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Initialize logging with JSON format for structured logs
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(filter),
        )
        .init();

    tracing::info!("Starting aria2-capture...");
    if cli.verbose {
        tracing::info!("Verbose logging enabled (TRACE level)");
    }
    tracing::trace!("CLI arguments: {:?}", cli);
    if let Some(ref config_dir) = cli.config {
        tracing::info!("Using config directory override: {:?}", config_dir);
    }

    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            tracing::error!("Failed to load configuration: {:#}", e);
            std::process::exit(cli::error::INVALID_INPUT);
        }
    };
    tracing::info!(
        "Config loaded: {} RPC servers, capture {}, monitor {}",
        config.rpc.len(),
        if config.capture.enabled { "on" } else { "off" },
        if config.monitor.enabled { "on" } else { "off" }
    );

    let state = AppState::new(config)?;

    // No subcommand means daemon mode
    let command = cli.command.unwrap_or(Commands::Run);
    let exit_code = cli::handler::handle_command(command, state).await;

    drop(_guard);
    std::process::exit(exit_code);
}
