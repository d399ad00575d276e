//! Scenario files replayed by `pluginhost simulate`.
//!
//! A scenario declares the installed plugins and a list of steps. Each step
//! plays one thing the platform or the user does:
//!
//! ```toml
//! [[plugins]]
//! package = "com.example.mail"
//! loaded = true
//! activities = [
//!     { name = "Inbox", launch_mode = "single_task" },
//!     { name = "Thread" },
//! ]
//!
//! [[steps]]
//! op = "launch"
//! package = "com.example.mail"
//! activity = "Inbox"
//! ```

use std::path::Path;

use serde::Deserialize;

use pluginhost_protocols::{ActivityInfo, ComponentName, IntentFlags, LaunchMode};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    #[serde(default)]
    pub name: Option<String>,

    /// Whether the package-manager service is connected at start.
    #[serde(default = "default_true")]
    pub connected: bool,

    #[serde(default)]
    pub plugins: Vec<PluginSpec>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PluginSpec {
    pub package: String,

    /// Loaded at start; otherwise the runtime appears on a `load` step.
    #[serde(default)]
    pub loaded: bool,

    #[serde(default)]
    pub activities: Vec<ActivitySpec>,

    /// Service classes, short or fully qualified.
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ActivitySpec {
    pub name: String,

    #[serde(default)]
    pub launch_mode: LaunchMode,

    #[serde(default)]
    pub task_affinity: Option<String>,

    #[serde(default)]
    pub process: Option<String>,
}

impl ActivitySpec {
    pub fn info(&self, package: &str) -> ActivityInfo {
        let mut info = ActivityInfo::new(component(package, &self.name), self.launch_mode);
        info.task_affinity = self.task_affinity.clone();
        info.process = self.process.clone();
        info
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FlagSpec {
    NewTask,
    SingleTop,
    ClearTop,
}

impl FlagSpec {
    pub fn bits(flags: &[FlagSpec]) -> IntentFlags {
        flags.iter().fold(IntentFlags::NONE, |acc, flag| {
            acc | match flag {
                FlagSpec::NewTask => IntentFlags::NEW_TASK,
                FlagSpec::SingleTop => IntentFlags::SINGLE_TOP,
                FlagSpec::ClearTop => IntentFlags::CLEAR_TOP,
            }
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Step {
    /// Start an activity.
    Launch {
        package: String,
        activity: String,
        #[serde(default)]
        flags: Vec<FlagSpec>,
    },
    /// Press back: finish the top activity of the plugin's focused task.
    Back { package: String },
    /// The plugin runtime finished loading.
    Load { package: String },
    /// The plugin runtime failed to load.
    LoadFailed {
        package: String,
        #[serde(default)]
        message: String,
    },
    /// The package-manager service connected.
    Connect,
    /// The package-manager service disconnected.
    Disconnect,
    /// The process dies and the OS recreates every live activity.
    Restart,
    StartService { package: String, service: String },
    StopService { package: String, service: String },
    BindService { package: String, service: String },
    UnbindService { package: String, service: String },
    /// Broadcast `QUIT_SERVICE`.
    Quit {
        #[serde(default)]
        kill: bool,
    },
    Unload { package: String },
    /// Print the current stacks.
    Dump,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Launch { .. } => "launch",
            Step::Back { .. } => "back",
            Step::Load { .. } => "load",
            Step::LoadFailed { .. } => "load_failed",
            Step::Connect => "connect",
            Step::Disconnect => "disconnect",
            Step::Restart => "restart",
            Step::StartService { .. } => "start_service",
            Step::StopService { .. } => "stop_service",
            Step::BindService { .. } => "bind_service",
            Step::UnbindService { .. } => "unbind_service",
            Step::Quit { .. } => "quit",
            Step::Unload { .. } => "unload",
            Step::Dump => "dump",
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(content.parse()?)
    }

    pub fn plugin(&self, package: &str) -> Option<&PluginSpec> {
        self.plugins.iter().find(|p| p.package == package)
    }
}

impl std::str::FromStr for Scenario {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

/// Expand a short class name against its package.
///
/// `Inbox` and `.Inbox` both become `<package>.Inbox`; anything else
/// containing a dot is taken as fully qualified.
pub(crate) fn class_name(package: &str, name: &str) -> String {
    if let Some(short) = name.strip_prefix('.') {
        format!("{}.{}", package, short)
    } else if name.contains('.') {
        name.to_string()
    } else {
        format!("{}.{}", package, name)
    }
}

pub(crate) fn component(package: &str, name: &str) -> ComponentName {
    ComponentName::new(package, class_name(package, name))
}
