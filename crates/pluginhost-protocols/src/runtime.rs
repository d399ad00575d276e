//! Collaborators the supervision core consumes.

use std::sync::Arc;

use crate::component::PluginService;
use crate::error::{ErrorCode, PluginError};
use crate::types::{ActivityInfo, ComponentName, Intent};

/// Looks up plugin runtimes by package.
pub trait RuntimeResolver: Send + Sync {
    /// The runtime for `package`, or `None` if it is not loaded.
    fn resolve_runtime(&self, package: &str) -> Option<Arc<dyn PluginRuntime>>;

    /// Whether `package` is loaded and ready to host components.
    fn is_runtime_ready(&self, package: &str) -> bool;

    /// Whether `package` is installed at all.
    fn is_installed(&self, _package: &str) -> bool {
        true
    }
}

/// A loaded plugin.
pub trait PluginRuntime: Send + Sync {
    fn package(&self) -> &str;

    /// Manifest attributes of an activity class, if declared.
    fn activity_info(&self, class: &str) -> Option<ActivityInfo>;

    /// Class namespaces in lookup order.
    fn class_resolvers(&self) -> Vec<Arc<dyn ClassResolver>>;
}

/// Outcome of a single namespace lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Found(T),
    NotFound,
}

impl<T> Resolution<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Resolution::Found(value) => Some(value),
            Resolution::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }
}

/// Everything a component needs at construction time.
///
/// Passed to constructors instead of being spliced in after the fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachContext {
    pub component: ComponentName,
    pub host_package: String,
    /// OS-registered proxy fronting this instance.
    pub proxy: ComponentName,
    pub process: String,
}

/// Constructor for a plugin service class.
pub type ServiceConstructor =
    Arc<dyn Fn(&AttachContext) -> Result<Box<dyn PluginService>, PluginError> + Send + Sync>;

/// One namespace in a prioritized class lookup chain.
pub trait ClassResolver: Send + Sync {
    fn namespace(&self) -> &str;

    fn resolve_service(&self, class: &str) -> Resolution<ServiceConstructor>;
}

/// One-way error/telemetry sink.
pub trait ErrorSink: Send + Sync {
    fn deliver(&self, success: bool, package: &str, code: ErrorCode, message: &str);
}

/// OS-level activity starter.
pub trait Launcher: Send + Sync {
    fn launch(&self, intent: Intent);
}

/// Package-manager service connectivity probe.
pub trait ServiceConnectivity: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Notified when a parked recovery reaches a terminal state.
pub trait RecoveryCallback: Send + Sync {
    fn on_recovery_finished(&self, package: &str, success: bool);
}
