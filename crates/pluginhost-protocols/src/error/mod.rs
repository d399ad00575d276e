//! Error types for the PluginHost protocol layer.

mod plugin;

pub use plugin::*;
