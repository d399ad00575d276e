//! Launch-mode resolution.
//!
//! The OS only ever sees one proxy activity class, so its own launch-mode
//! handling cannot tell plugin activities apart. The resolver applies the
//! plugin's declared semantics to the logical and physical stacks and then
//! rewrites the intent flags so the OS-level launch produces the same
//! visible result.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use pluginhost_protocols::{ActivityInfo, ComponentName, Intent, IntentFlags, LaunchMode};

use super::{LaunchDecision, LaunchOutcome};
use crate::pending::PendingIntents;
use crate::record::ComponentRecord;
use crate::stack::{GlobalStackRegistry, PluginDirectory, PluginStacks, TaskStack};

/// Applies standard / singleTop / singleTask / clearTop semantics.
pub struct LaunchModeResolver {
    global: Arc<GlobalStackRegistry>,
    plugins: Arc<PluginDirectory>,
    pending: Arc<PendingIntents>,
}

impl LaunchModeResolver {
    pub fn new(
        global: Arc<GlobalStackRegistry>,
        plugins: Arc<PluginDirectory>,
        pending: Arc<PendingIntents>,
    ) -> Self {
        Self {
            global,
            plugins,
            pending,
        }
    }

    /// Resolve a launch of `info` by the plugin owning `stacks`.
    ///
    /// Mutates the stacks (finishing and popping cleared records, merging or
    /// switching tasks) and rewrites `intent.flags` for the OS-level launch.
    pub fn resolve(
        &self,
        stacks: &PluginStacks,
        info: &ActivityInfo,
        intent: &mut Intent,
    ) -> LaunchDecision {
        if info.launch_mode == LaunchMode::SingleInstance {
            debug!(component = %info.component, "singleInstance is not emulated, launching as standard");
            return LaunchDecision::new(LaunchOutcome::PassThrough);
        }

        let requested = intent.flags;
        let single_top = info.launch_mode == LaunchMode::SingleTop
            || requested.contains(IntentFlags::SINGLE_TOP);
        let clear_top = requested.contains(IntentFlags::CLEAR_TOP);
        let single_task = info.launch_mode == LaunchMode::SingleTask;

        // Handled logically; the physical stack must not apply them again.
        if requested.contains(IntentFlags::SINGLE_TOP) {
            intent.flags.toggle(IntentFlags::SINGLE_TOP);
        }
        if requested.contains(IntentFlags::CLEAR_TOP) {
            intent.flags.toggle(IntentFlags::CLEAR_TOP);
        }

        let decision = if single_task || clear_top {
            self.resolve_clear_top(stacks, info, intent, single_task)
        } else if single_top {
            self.resolve_single_top(stacks, &info.component, intent)
        } else {
            LaunchDecision::new(LaunchOutcome::NewInstance)
        };

        info!(
            plugin = %stacks.package(),
            component = %info.component,
            mode = ?info.launch_mode,
            outcome = decision.outcome.name(),
            finished = decision.finished.len(),
            merged = decision.merged_background,
            "resolved launch"
        );
        decision
    }

    fn resolve_single_top(
        &self,
        stacks: &PluginStacks,
        target: &ComponentName,
        intent: &mut Intent,
    ) -> LaunchDecision {
        let physical = self
            .global
            .find_associated_stack(stacks.package(), &stacks.focused());

        // Other plugins' screens opened on top of ours are transient; the
        // first record of this plugin is the real top.
        let mut foreign = Vec::new();
        let mut matched = None;
        for record in physical.records() {
            if record.is_finishing() {
                continue;
            }
            if record.package() != stacks.package() {
                foreign.push(record);
                continue;
            }
            if record.fronts(target) {
                matched = Some(record);
            }
            break;
        }

        let Some(existing) = matched else {
            return LaunchDecision::new(LaunchOutcome::NewInstance);
        };

        intent.add_flags(IntentFlags::SINGLE_TOP);
        existing.set_intent(intent.clone());
        let mut decision = LaunchDecision::new(LaunchOutcome::DeliverToExisting(existing));
        decision.finished = self.finish_foreign(&physical, foreign);
        decision
    }

    fn resolve_clear_top(
        &self,
        stacks: &PluginStacks,
        info: &ActivityInfo,
        intent: &mut Intent,
        single_task: bool,
    ) -> LaunchDecision {
        let target = &info.component;
        let background = stacks
            .last_focused()
            .filter(|stack| single_task && stack.name() == info.task_name());
        let (candidate, in_background) = match background {
            Some(stack) => (stack, true),
            None => (stacks.focused(), false),
        };

        match candidate.find(|r| !r.is_finishing() && r.fronts(target)) {
            Some((index, existing)) => {
                self.clear_above(stacks, &candidate, index, existing, intent, in_background)
            }
            None => self.resolve_absent(stacks, info, intent, single_task),
        }
    }

    fn clear_above(
        &self,
        stacks: &PluginStacks,
        candidate: &Arc<TaskStack>,
        index: usize,
        existing: Arc<ComponentRecord>,
        intent: &mut Intent,
        in_background: bool,
    ) -> LaunchDecision {
        let physical = self.global.find_associated_stack(stacks.package(), candidate);
        let mut finished = Vec::new();

        if physical.contains(existing.id()) {
            let foreign: Vec<_> = physical
                .records()
                .into_iter()
                .take_while(|r| r.id() != existing.id())
                .filter(|r| r.package() != stacks.package() && !r.is_finishing())
                .collect();
            finished.extend(self.finish_foreign(&physical, foreign));
        }

        // No rollback: a record is popped only after its finish was issued.
        for record in candidate.records().into_iter().take(index) {
            record.finish();
            physical.pop(&record);
            candidate.pop(&record);
            finished.push(record);
        }

        intent.add_flags(IntentFlags::CLEAR_TOP | IntentFlags::SINGLE_TOP);
        existing.set_intent(intent.clone());

        let mut decision = LaunchDecision::new(LaunchOutcome::DeliverToExisting(existing));
        decision.finished = finished;

        if in_background {
            let foreground = stacks.focused();
            self.merge_into(stacks.package(), &foreground, candidate);
            stacks.swap_focus();
            decision.merged_background = true;
        }
        decision
    }

    fn resolve_absent(
        &self,
        stacks: &PluginStacks,
        info: &ActivityInfo,
        intent: &mut Intent,
        single_task: bool,
    ) -> LaunchDecision {
        let mut decision = match self.pending.find_targeting(stacks.package(), &info.component) {
            Some(request) => {
                debug!(component = %info.component, %request, "target is still pending");
                intent.add_flags(IntentFlags::CLEAR_TOP | IntentFlags::SINGLE_TOP);
                LaunchDecision::new(LaunchOutcome::MatchedPending(request))
            }
            None => LaunchDecision::new(LaunchOutcome::NewInstance),
        };

        let task_name = info.task_name();
        if single_task && stacks.focused().name() != task_name {
            stacks.switch_to(task_name);
            decision.switched_task = Some(task_name.to_string());
        }
        decision
    }

    /// Finish other plugins' records and pop them from `physical` and from
    /// their owner's logical stack.
    fn finish_foreign(
        &self,
        physical: &TaskStack,
        records: Vec<Arc<ComponentRecord>>,
    ) -> Vec<Arc<ComponentRecord>> {
        for record in &records {
            debug!(component = %record.component(), "finishing interstitial activity");
            record.finish();
            physical.pop(record);
            let owner = self.plugins.get(record.package()).map(|entry| entry.clone());
            if let Some(stack) = owner.and_then(|owner| owner.stack_of(record.id())) {
                stack.pop(record);
            }
        }
        records
    }

    /// Move `from` onto the top of `into`, physical view first.
    fn merge_into(&self, package: &str, from: &TaskStack, into: &TaskStack) {
        let from_physical = self.global.find_associated_stack(package, from);
        let into_physical = self.global.find_associated_stack(package, into);

        let _guard = self.global.relocating();
        let moving: HashSet<Uuid> = from.records().iter().map(|record| record.id()).collect();
        if !Arc::ptr_eq(&from_physical, &into_physical) {
            into_physical.merge_matching_from(&from_physical, |record| moving.contains(&record.id()));
        }
        into.merge_from(from);
    }
}
