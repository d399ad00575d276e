//! PluginHost - component lifecycle and task-stack supervision for plugins
//!
//! Main entry point for the PluginHost CLI.

mod cli;
mod cmd_config;
mod scenario;
mod simulate;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pluginhost_config::{ConfigLoader, LoggingConfig};

use cli::{Cli, Commands};
use cmd_config::handle_config_command;
use simulate::run_simulation;

/// Initialize tracing with console output and, when a log directory is
/// available, a daily rolling file.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = logging
        .dir
        .clone()
        .unwrap_or_else(|| ConfigLoader::default_dir().join("logs"));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("pluginhost")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes the file writer on drop; keep it for the whole run.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    tracing_subscriber::registry()
        .with(env_filter)
        // Console layer on stderr so stdout carries only command output
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // `config check` reports load errors itself instead of failing up front.
    let config = match &cli.command {
        Commands::Config { .. } => ConfigLoader::load_or_default(&cli.config).unwrap_or_default(),
        _ => ConfigLoader::load_or_default(&cli.config)?,
    };
    init_tracing(&config.logging)?;

    match cli.command {
        Commands::Simulate { scenario, format } => run_simulation(config, &scenario, format).await,
        Commands::Config { action } => handle_config_command(action, &cli.config),
    }
}
