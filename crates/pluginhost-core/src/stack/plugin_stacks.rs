//! Per-plugin stack registry.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use super::TaskStack;
use crate::record::ComponentRecord;

struct Focus {
    focused: Arc<TaskStack>,
    last_focused: Option<Arc<TaskStack>>,
}

/// Logical stacks owned by one plugin runtime.
///
/// Holds a foreground (`focused`) and an optional background
/// (`last_focused`) stack, plus every task stack ever referenced by name.
pub struct PluginStacks {
    package: String,
    stacks: DashMap<String, Arc<TaskStack>>,
    focus: RwLock<Focus>,
}

impl PluginStacks {
    /// Create the registry, focused on the plugin's default task.
    pub fn new(package: impl Into<String>) -> Self {
        let package = package.into();
        let default_stack = Arc::new(TaskStack::logical(package.clone()));
        let stacks = DashMap::new();
        stacks.insert(package.clone(), default_stack.clone());
        Self {
            package,
            stacks,
            focus: RwLock::new(Focus {
                focused: default_stack,
                last_focused: None,
            }),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn focused(&self) -> Arc<TaskStack> {
        self.focus.read().focused.clone()
    }

    pub fn last_focused(&self) -> Option<Arc<TaskStack>> {
        self.focus.read().last_focused.clone()
    }

    pub fn default_stack(&self) -> Arc<TaskStack> {
        self.stack_for_task(&self.package)
    }

    pub fn stack(&self, task_name: &str) -> Option<Arc<TaskStack>> {
        self.stacks.get(task_name).map(|s| s.clone())
    }

    /// The stack for `task_name`, created on first reference.
    pub fn stack_for_task(&self, task_name: &str) -> Arc<TaskStack> {
        self.stacks
            .entry(task_name.to_string())
            .or_insert_with(|| Arc::new(TaskStack::logical(task_name)))
            .clone()
    }

    /// Bring `task_name` to the foreground; the previous foreground becomes
    /// the background stack.
    pub fn switch_to(&self, task_name: &str) -> Arc<TaskStack> {
        let target = self.stack_for_task(task_name);
        let mut focus = self.focus.write();
        if !Arc::ptr_eq(&focus.focused, &target) {
            let previous = std::mem::replace(&mut focus.focused, target.clone());
            info!(
                plugin = %self.package,
                from = %previous.name(),
                to = %target.name(),
                "switched focused task"
            );
            focus.last_focused = Some(previous);
        }
        target
    }

    /// Exchange foreground and background. No-op without a background stack.
    pub fn swap_focus(&self) -> bool {
        let mut focus = self.focus.write();
        match focus.last_focused.take() {
            Some(background) => {
                let previous = std::mem::replace(&mut focus.focused, background);
                focus.last_focused = Some(previous);
                true
            }
            None => false,
        }
    }

    /// The logical stack currently holding record `id`.
    pub fn stack_of(&self, id: Uuid) -> Option<Arc<TaskStack>> {
        self.stacks
            .iter()
            .find(|entry| entry.value().contains(id))
            .map(|entry| entry.value().clone())
    }

    pub fn stacks(&self) -> Vec<Arc<TaskStack>> {
        self.stacks.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn record_count(&self) -> usize {
        self.stacks.iter().map(|entry| entry.value().len()).sum()
    }

    /// Empty every stack, optionally finishing the removed records.
    pub fn clear(&self, finish_remaining: bool) -> Vec<Arc<ComponentRecord>> {
        self.stacks()
            .into_iter()
            .flat_map(|stack| stack.clear(finish_remaining))
            .collect()
    }
}
