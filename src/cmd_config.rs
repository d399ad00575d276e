//! Config subcommand handlers for PluginHost.

use std::path::Path;

use tracing::info;

use pluginhost_config::{ConfigError, ConfigLoader, ConfigValidator};

use crate::cli::ConfigAction;

/// Handle config subcommands.
pub(crate) fn handle_config_command(
    action: ConfigAction,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Check => config_check(path),
        ConfigAction::Show => config_show(path),
    }
}

/// Load and validate the configuration file, printing every finding.
fn config_check(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = match ConfigLoader::load(path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => {
            println!("{}: not found, defaults apply", path.display());
            Default::default()
        }
        Err(e) => {
            println!("{}: {}", path.display(), e);
            return Err(e.into());
        }
    };

    let result = ConfigValidator::validate(&config);
    for error in &result.errors {
        println!("error   {}: {}", error.path, error.message);
    }
    for warning in &result.warnings {
        println!("warning {}: {}", warning.path, warning.message);
    }

    let valid = result.is_valid();
    let warnings = result.warnings.len();
    result.into_result()?;
    if valid {
        info!(path = %path.display(), warnings, "configuration is valid");
        println!("{}: ok ({} warning(s))", path.display(), warnings);
    }
    Ok(())
}

/// Print the effective configuration after defaults and env expansion.
fn config_show(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(path)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
