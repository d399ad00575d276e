//! Plugin component errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable numeric codes reported to the [`ErrorSink`](crate::ErrorSink).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    NotInstalled = 4001,
    RuntimeNotReady = 4002,
    ClassLoad = 4003,
    Instantiation = 4004,
    Attach = 4005,
    LifecycleCallback = 4006,
    ComponentNotFound = 4007,
    InvalidIntent = 4008,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_i32())
    }
}

/// Failures while resolving, instantiating or driving a plugin component.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    #[error("Plugin not installed: {0}")]
    NotInstalled(String),

    #[error("Plugin runtime not ready: {0}")]
    RuntimeNotReady(String),

    #[error("Class not found: {class} (searched {searched} namespaces)")]
    ClassLoad { class: String, searched: usize },

    #[error("Failed to instantiate {class}: {message}")]
    Instantiation { class: String, message: String },

    #[error("Failed to attach {class}: {message}")]
    Attach { class: String, message: String },

    #[error("{callback} failed for {class}: {message}")]
    LifecycleCallback {
        class: String,
        callback: String,
        message: String,
    },

    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    #[error("Invalid intent: {0}")]
    InvalidIntent(String),
}

impl PluginError {
    pub fn lifecycle(
        class: impl Into<String>,
        callback: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::LifecycleCallback {
            class: class.into(),
            callback: callback.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotInstalled(_) => ErrorCode::NotInstalled,
            Self::RuntimeNotReady(_) => ErrorCode::RuntimeNotReady,
            Self::ClassLoad { .. } => ErrorCode::ClassLoad,
            Self::Instantiation { .. } => ErrorCode::Instantiation,
            Self::Attach { .. } => ErrorCode::Attach,
            Self::LifecycleCallback { .. } => ErrorCode::LifecycleCallback,
            Self::ComponentNotFound(_) => ErrorCode::ComponentNotFound,
            Self::InvalidIntent(_) => ErrorCode::InvalidIntent,
        }
    }

    /// A "not ready" result is a normal negative outcome that parks the
    /// request instead of failing it.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::RuntimeNotReady(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_installed_error() {
        let err = PluginError::NotInstalled("com.example".to_string());
        assert!(err.to_string().contains("not installed"));
        assert!(err.to_string().contains("com.example"));
        assert_eq!(err.code(), ErrorCode::NotInstalled);
    }

    #[test]
    fn test_class_load_error() {
        let err = PluginError::ClassLoad {
            class: "a.B".to_string(),
            searched: 3,
        };
        let display = err.to_string();
        assert!(display.contains("a.B"));
        assert!(display.contains("3 namespaces"));
        assert_eq!(err.code().as_i32(), 4003);
    }

    #[test]
    fn test_lifecycle_error() {
        let err = PluginError::lifecycle("a.Svc", "on_create", "boom");
        assert_eq!(err.to_string(), "on_create failed for a.Svc: boom");
        assert_eq!(err.code(), ErrorCode::LifecycleCallback);
    }

    #[test]
    fn test_only_runtime_not_ready_parks() {
        assert!(PluginError::RuntimeNotReady("p".into()).is_not_ready());
        assert!(!PluginError::NotInstalled("p".into()).is_not_ready());
        assert!(!PluginError::InvalidIntent("no component".into()).is_not_ready());
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::Attach.to_string(), "Attach(4005)");
        assert_eq!(ErrorCode::Success.as_i32(), 0);
    }

    #[test]
    fn test_all_error_variants_display() {
        let errors = vec![
            PluginError::NotInstalled("p".to_string()),
            PluginError::RuntimeNotReady("p".to_string()),
            PluginError::ClassLoad {
                class: "c".to_string(),
                searched: 1,
            },
            PluginError::Instantiation {
                class: "c".to_string(),
                message: "m".to_string(),
            },
            PluginError::Attach {
                class: "c".to_string(),
                message: "m".to_string(),
            },
            PluginError::lifecycle("c", "cb", "m"),
            PluginError::ComponentNotFound("c".to_string()),
            PluginError::InvalidIntent("i".to_string()),
        ];

        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }
}
