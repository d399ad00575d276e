//! Logical broadcast actions and intent-extra keys.
//!
//! These names are shared between the launch flow, the service proxies and
//! the recovery protocol. They are logical identifiers, not OS constants.

/// Broadcast action names.
pub mod action {
    /// The package-manager service connection has been (re)established.
    pub const SERVICE_CONNECTED: &str = "pluginhost.action.SERVICE_CONNECTED";
    /// A plugin runtime finished loading.
    pub const PLUGIN_LOADED: &str = "pluginhost.action.PLUGIN_LOADED";
    /// A plugin runtime failed to start.
    pub const START_PLUGIN_ERROR: &str = "pluginhost.action.START_PLUGIN_ERROR";
    /// Stop every proxied service (optionally killing the process).
    pub const QUIT_SERVICE: &str = "pluginhost.action.QUIT_SERVICE";
    /// Ask the runtime loader to bring a plugin up.
    pub const START_PLUGIN: &str = "pluginhost.action.START_PLUGIN";
}

/// Intent extra keys.
pub mod extra {
    pub const TARGET_PACKAGE: &str = "pluginhost.extra.TARGET_PACKAGE";
    pub const TARGET_CLASS: &str = "pluginhost.extra.TARGET_CLASS";
    pub const TARGET_PROCESS: &str = "pluginhost.extra.TARGET_PROCESS";
    /// Ticket id of a stashed creation icicle.
    pub const RECOVERY_ICICLE_ID: &str = "pluginhost.extra.RECOVERY_ICICLE_ID";
    /// Ticket id of a stashed restore bundle.
    pub const RECOVERY_SAVED_STATE_ID: &str = "pluginhost.extra.RECOVERY_SAVED_STATE_ID";
    pub const SHOW_LOADING: &str = "pluginhost.extra.SHOW_LOADING";
    /// Set on `QUIT_SERVICE` to terminate the process once services are gone.
    pub const KILL_PROCESS: &str = "pluginhost.extra.KILL_PROCESS";
    /// Error message carried by `START_PLUGIN_ERROR`.
    pub const ERROR_MESSAGE: &str = "pluginhost.extra.ERROR_MESSAGE";
}
