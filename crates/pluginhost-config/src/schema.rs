//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSection,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub recovery: RecoveryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity of the hosting application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSection {
    /// Host package; every plugin's default task lives under this name.
    #[serde(default = "default_host_package")]
    pub package: String,

    /// Process used when a component does not name one.
    #[serde(default = "default_process")]
    pub process: String,
}

fn default_host_package() -> String {
    "com.pluginhost.host".to_string()
}

fn default_process() -> String {
    "com.pluginhost.host".to_string()
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            package: default_host_package(),
            process: default_process(),
        }
    }
}

/// Statically registered proxy components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy activity class every plugin activity is redirected to.
    #[serde(default = "default_activity_proxy")]
    pub activity: String,

    /// Fixed pool of proxy service classes.
    #[serde(default = "default_service_proxies")]
    pub services: Vec<String>,

    /// Placeholder shown while a parked launch waits for its runtime.
    #[serde(default = "default_recovery_activity")]
    pub recovery_activity: String,
}

fn default_activity_proxy() -> String {
    "com.pluginhost.host.ActivityProxy".to_string()
}

fn default_service_proxies() -> Vec<String> {
    (0..3)
        .map(|i| format!("com.pluginhost.host.ServiceProxy{}", i))
        .collect()
}

fn default_recovery_activity() -> String {
    "com.pluginhost.host.RecoveryActivity".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            activity: default_activity_proxy(),
            services: default_service_proxies(),
            recovery_activity: default_recovery_activity(),
        }
    }
}

/// Process-restart recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Priority of the first readiness receiver in a process generation.
    #[serde(default)]
    pub base_priority: i32,

    /// Mark parked relaunches so the placeholder shows a loading view.
    #[serde(default = "default_true")]
    pub show_loading: bool,

    /// Broadcast `START_PLUGIN` when a request is parked.
    #[serde(default = "default_true")]
    pub request_plugin_start: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            base_priority: 0,
            show_loading: true,
            request_plugin_start: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rolling log files; `None` disables file output.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}
