//! CLI definitions for PluginHost.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// PluginHost CLI.
#[derive(Parser)]
#[command(name = "pluginhost")]
#[command(about = "Component lifecycle and task-stack supervision for plugins")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Replay a scenario against an in-memory host and print its stacks
    Simulate {
        /// Scenario file (TOML)
        scenario: PathBuf,

        /// Output format of the stack dumps
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Validate the configuration file
    Check,

    /// Print the effective configuration
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}
