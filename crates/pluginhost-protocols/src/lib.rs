//! # PluginHost Protocols
//!
//! Shared value types and collaborator traits for the PluginHost framework.
//! Contains only definitions - the supervision logic lives in `pluginhost-core`.
//!
//! ## Core Traits
//!
//! - [`RuntimeResolver`] / [`PluginRuntime`] - Access to loaded plugin runtimes
//! - [`ClassResolver`] - One namespace in a prioritized class lookup chain
//! - [`ComponentHandle`] - Host capability of a proxy activity shell
//! - [`PluginService`] / [`ServiceHost`] - Delegate and host sides of a proxied service
//! - [`ErrorSink`], [`Launcher`], [`RecoveryCallback`] - Outbound notifications

pub mod actions;
pub mod component;
pub mod error;
pub mod runtime;
pub mod types;

pub use component::{ComponentHandle, PluginService, ServiceHost, StartResult};
pub use error::{ErrorCode, PluginError};
pub use runtime::{
    AttachContext, ClassResolver, ErrorSink, Launcher, PluginRuntime, RecoveryCallback,
    Resolution, RuntimeResolver, ServiceConnectivity, ServiceConstructor,
};
pub use types::*;
