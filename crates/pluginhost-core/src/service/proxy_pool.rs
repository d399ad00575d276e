//! Fixed pool of OS-registered proxy services.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::debug;

use pluginhost_config::HostConfig;
use pluginhost_protocols::actions::extra;
use pluginhost_protocols::{ComponentName, Intent};

/// Assigns each target process a proxy slot.
///
/// Assignment is sticky per process. Once every slot is taken, new
/// processes wrap around and share.
pub struct ProxyPool {
    slots: Vec<ComponentName>,
    assigned: DashMap<String, usize>,
    next: AtomicUsize,
}

impl ProxyPool {
    pub fn new(host_package: &str, classes: &[String]) -> Self {
        Self {
            slots: classes
                .iter()
                .map(|class| ComponentName::new(host_package, class.clone()))
                .collect(),
            assigned: DashMap::new(),
            next: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(&config.host.package, &config.proxy.services)
    }

    pub fn slots(&self) -> &[ComponentName] {
        &self.slots
    }

    /// The proxy fronting services of `process`. `None` for an empty pool.
    pub fn proxy_for(&self, process: &str) -> Option<ComponentName> {
        if self.slots.is_empty() {
            return None;
        }
        let slot = *self.assigned.entry(process.to_string()).or_insert_with(|| {
            let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.slots.len();
            debug!(process, slot, "assigned proxy slot");
            slot
        });
        self.slots.get(slot).cloned()
    }

    /// Processes currently assigned to `proxy`.
    pub fn processes_of(&self, proxy: &ComponentName) -> Vec<String> {
        let Some(slot) = self.slots.iter().position(|s| s == proxy) else {
            return Vec::new();
        };
        let mut processes: Vec<String> = self
            .assigned
            .iter()
            .filter(|entry| *entry.value() == slot)
            .map(|entry| entry.key().clone())
            .collect();
        processes.sort();
        processes
    }
}

/// Rewrite `intent` to start `proxy`, carrying the real target in extras.
pub fn redirect_intent(
    proxy: &ComponentName,
    target: &ComponentName,
    process: &str,
    intent: &Intent,
) -> Intent {
    let mut redirected = intent.clone();
    redirected.component = Some(proxy.clone());
    redirected.put_extra(extra::TARGET_PACKAGE, target.package.clone());
    redirected.put_extra(extra::TARGET_CLASS, target.class.clone());
    redirected.put_extra(extra::TARGET_PROCESS, process);
    redirected
}

/// The real target and process of a redirected intent.
pub fn redirected_target(intent: &Intent) -> Option<(ComponentName, String)> {
    let package = intent.string_extra(extra::TARGET_PACKAGE)?;
    let class = intent.string_extra(extra::TARGET_CLASS)?;
    let process = intent
        .string_extra(extra::TARGET_PROCESS)
        .unwrap_or(package)
        .to_string();
    Some((ComponentName::new(package, class), process))
}
