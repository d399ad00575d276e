//! Logical and physical task stacks.
//!
//! Every plugin manages its own *logical* stacks ([`PluginStacks`]). The
//! [`GlobalStackRegistry`] keeps the *physical* stacks the OS would see, so
//! activities of different plugins interleave in the right z-order. Each
//! push or pop on a logical stack is mirrored on its associated physical
//! stack.

mod global;
mod plugin_stacks;
mod task_stack;

pub use global::GlobalStackRegistry;
pub use plugin_stacks::PluginStacks;
pub use task_stack::{StackKind, TaskStack};

/// Per-plugin stack registries keyed by plugin package.
pub type PluginDirectory = dashmap::DashMap<String, std::sync::Arc<PluginStacks>>;

#[cfg(test)]
#[path = "stack_tests.rs"]
mod tests;
