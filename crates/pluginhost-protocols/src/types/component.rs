//! Component identity and manifest-level activity attributes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully qualified component: owning package plus class name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentName {
    pub package: String,
    pub class: String,
}

impl ComponentName {
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class: class.into(),
        }
    }

    /// Short form, e.g. `com.example/.MainActivity`.
    pub fn short_class(&self) -> &str {
        match self.class.strip_prefix(self.package.as_str()) {
            Some(rest) if rest.starts_with('.') => rest,
            _ => &self.class,
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.short_class())
    }
}

/// Declared launch mode of a plugin activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    #[default]
    Standard,
    SingleTop,
    SingleTask,
    /// Not emulated; launches behave as [`LaunchMode::Standard`].
    SingleInstance,
}

/// Resolved attributes of a plugin activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInfo {
    pub component: ComponentName,
    #[serde(default)]
    pub launch_mode: LaunchMode,
    /// Explicit task affinity; `None` means the plugin's default task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_affinity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
}

impl ActivityInfo {
    pub fn new(component: ComponentName, launch_mode: LaunchMode) -> Self {
        Self {
            component,
            launch_mode,
            task_affinity: None,
            process: None,
        }
    }

    pub fn with_task_affinity(mut self, affinity: impl Into<String>) -> Self {
        self.task_affinity = Some(affinity.into());
        self
    }

    pub fn with_process(mut self, process: impl Into<String>) -> Self {
        self.process = Some(process.into());
        self
    }

    /// Name of the logical task this activity belongs to.
    ///
    /// An absent or empty affinity falls back to the plugin package, which
    /// names the plugin's default task.
    pub fn task_name(&self) -> &str {
        match self.task_affinity.as_deref() {
            Some(affinity) if !affinity.is_empty() => affinity,
            _ => &self.component.package,
        }
    }
}
