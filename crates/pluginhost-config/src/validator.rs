//! Configuration validation.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::schema::HostConfig;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a [`ConfigError`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &HostConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_host(config, &mut result);
        Self::validate_proxy(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    fn validate_host(config: &HostConfig, result: &mut ValidationResult) {
        if config.host.package.trim().is_empty() {
            result.add_error(ValidationError::new(
                "host.package",
                "Host package cannot be empty",
            ));
        }

        if config.host.process.trim().is_empty() {
            result.add_error(ValidationError::new(
                "host.process",
                "Default process cannot be empty",
            ));
        }
    }

    fn validate_proxy(config: &HostConfig, result: &mut ValidationResult) {
        if config.proxy.activity.trim().is_empty() {
            result.add_error(ValidationError::new(
                "proxy.activity",
                "Proxy activity cannot be empty",
            ));
        }

        if config.proxy.services.is_empty() {
            result.add_error(ValidationError::new(
                "proxy.services",
                "At least one proxy service is required",
            ));
        }

        let mut seen = HashSet::new();
        for service in &config.proxy.services {
            if !seen.insert(service.as_str()) {
                result.add_error(ValidationError::new(
                    "proxy.services",
                    format!("Duplicate proxy service: {}", service),
                ));
            }
        }

        if !config.proxy.activity.starts_with(&config.host.package) {
            result.add_warning(ValidationWarning::new(
                "proxy.activity",
                "Proxy activity is not declared under the host package",
            ));
        }
    }

    fn validate_logging(config: &HostConfig, result: &mut ValidationResult) {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
            result.add_warning(ValidationWarning::new(
                "logging.level",
                format!(
                    "'{}' is not a plain level; it will be used as a filter directive",
                    config.logging.level
                ),
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
