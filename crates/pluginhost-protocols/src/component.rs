//! Capabilities exchanged between proxy shells and plugin components.
//!
//! A proxy never owns its plugin counterpart and vice versa. Both sides are
//! held by a neutral controller (a component or service record) that
//! delegates in either direction.

use crate::error::PluginError;
use crate::types::{ComponentName, Intent};

/// Host capability of a live activity shell.
pub trait ComponentHandle: Send + Sync {
    /// Ask the OS to finish this component. Must be idempotent.
    fn finish(&self);

    /// Whether a finish has already been requested.
    fn is_finishing(&self) -> bool;

    /// The real plugin component this shell fronts.
    ///
    /// Generic proxies answer with the plugin class they were redirected to.
    /// Shells that *are* the plugin class return `None` and are identified
    /// by their record's component.
    fn fronted_component(&self) -> Option<ComponentName> {
        None
    }
}

/// What the service asks the OS to do if its process is killed while started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartResult {
    /// Recreate the service after a kill, with a null intent.
    #[default]
    Sticky,
    /// Do not recreate.
    NotSticky,
    /// Recreate and redeliver the last intent.
    RedeliverIntent,
}

impl StartResult {
    /// Whether the proxy should recreate this service unprompted after a restart.
    pub fn restarts_on_kill(self) -> bool {
        !matches!(self, StartResult::NotSticky)
    }
}

/// Delegate capability of a plugin service instance.
pub trait PluginService: Send {
    fn on_create(&mut self) -> Result<(), PluginError>;

    fn on_start_command(
        &mut self,
        intent: &Intent,
        start_id: u32,
    ) -> Result<StartResult, PluginError>;

    fn on_bind(&mut self, _intent: &Intent) -> Result<(), PluginError> {
        Ok(())
    }

    /// Returns whether a later rebind should be delivered.
    fn on_unbind(&mut self, _intent: &Intent) -> bool {
        false
    }

    fn on_destroy(&mut self) {}
}

/// Host capability of an OS-registered proxy service.
pub trait ServiceHost: Send + Sync {
    /// The proxy class registered with the OS.
    fn component(&self) -> &ComponentName;

    /// Stop the proxy service itself.
    fn stop_self(&self);

    /// Terminate the hosting process.
    fn kill_process(&self) {}
}
