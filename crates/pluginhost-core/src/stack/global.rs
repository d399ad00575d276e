//! Process-wide physical stacks.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::TaskStack;

/// Physical stacks keyed by system-level task name.
///
/// Stacks are created lazily on first reference and live for the
/// lifetime of the registry.
pub struct GlobalStackRegistry {
    host_package: String,
    stacks: DashMap<String, Arc<TaskStack>>,
    /// Held while records move between stacks or are removed by id, so a
    /// removal never misses a record that is in flight.
    relocation: Mutex<()>,
}

impl GlobalStackRegistry {
    pub fn new(host_package: impl Into<String>) -> Self {
        Self {
            host_package: host_package.into(),
            stacks: DashMap::new(),
            relocation: Mutex::new(()),
        }
    }

    pub fn host_package(&self) -> &str {
        &self.host_package
    }

    /// System-level name of a plugin's logical task.
    ///
    /// - the plugin's own package maps to the host package, since plugin
    ///   activities run under the host's identity;
    /// - `<plugin package><suffix>` is a secondary affinity slot and maps to
    ///   `<host package><suffix>`;
    /// - any other affinity is already system-level.
    pub fn system_name(&self, plugin_package: &str, task_name: &str) -> String {
        if task_name == plugin_package {
            return self.host_package.clone();
        }
        match task_name.strip_prefix(plugin_package) {
            Some(suffix) if !suffix.is_empty() => format!("{}{}", self.host_package, suffix),
            _ => task_name.to_string(),
        }
    }

    /// The physical stack mirroring `logical`, created on first reference.
    pub fn find_associated_stack(&self, plugin_package: &str, logical: &TaskStack) -> Arc<TaskStack> {
        self.stack_named(&self.system_name(plugin_package, logical.name()))
    }

    pub fn stack_named(&self, system_name: &str) -> Arc<TaskStack> {
        self.stacks
            .entry(system_name.to_string())
            .or_insert_with(|| {
                debug!(stack = %system_name, "created physical stack");
                Arc::new(TaskStack::physical(system_name))
            })
            .clone()
    }

    pub fn stack(&self, system_name: &str) -> Option<Arc<TaskStack>> {
        self.stacks.get(system_name).map(|s| s.clone())
    }

    /// The physical stack currently holding record `id`.
    pub fn stack_of(&self, id: Uuid) -> Option<Arc<TaskStack>> {
        self.stacks
            .iter()
            .find(|entry| entry.value().contains(id))
            .map(|entry| entry.value().clone())
    }

    /// Pop record `id` from whichever physical stack holds it.
    pub fn remove_record(&self, id: Uuid) -> bool {
        let _guard = self.relocation.lock();
        match self.stack_of(id) {
            Some(stack) => stack.remove(id).is_some(),
            None => false,
        }
    }

    /// Exclude removals by id until the guard drops. Take it before any
    /// stack lock.
    pub fn relocating(&self) -> MutexGuard<'_, ()> {
        self.relocation.lock()
    }

    pub fn stacks(&self) -> Vec<Arc<TaskStack>> {
        self.stacks.iter().map(|entry| entry.value().clone()).collect()
    }
}
