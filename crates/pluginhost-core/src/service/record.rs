//! Live service instance bookkeeping.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use pluginhost_protocols::{ComponentName, PluginService, ServiceHost};

/// Service lifecycle state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum ServiceState {
    Default = 0,
    Created = 1,
    Started = 2,
    Stopped = 3,
    Destroyed = 4,
}

impl From<u8> for ServiceState {
    fn from(v: u8) -> Self {
        match v {
            1 => ServiceState::Created,
            2 => ServiceState::Started,
            3 => ServiceState::Stopped,
            4 => ServiceState::Destroyed,
            _ => ServiceState::Default,
        }
    }
}

/// One plugin service instance and the proxy fronting it.
pub struct ServiceRecord {
    component: ComponentName,
    proxy: Arc<dyn ServiceHost>,
    instance: Mutex<Box<dyn PluginService>>,
    state: AtomicU8,
    bind_count: AtomicU32,
    self_launch: AtomicBool,
    created_at: DateTime<Utc>,
}

impl ServiceRecord {
    pub fn new(
        component: ComponentName,
        proxy: Arc<dyn ServiceHost>,
        instance: Box<dyn PluginService>,
    ) -> Self {
        Self {
            component,
            proxy,
            instance: Mutex::new(instance),
            state: AtomicU8::new(ServiceState::Default as u8),
            bind_count: AtomicU32::new(0),
            self_launch: AtomicBool::new(false),
            created_at: Utc::now(),
        }
    }

    pub fn component(&self) -> &ComponentName {
        &self.component
    }

    pub fn package(&self) -> &str {
        &self.component.package
    }

    pub fn proxy(&self) -> &Arc<dyn ServiceHost> {
        &self.proxy
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from(self.state.load(Ordering::SeqCst))
    }

    /// Move to `next` if it is strictly later than the current state.
    ///
    /// Returns whether the transition happened.
    pub fn advance(&self, next: ServiceState) -> bool {
        self.state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (next as u8 > current).then_some(next as u8)
            })
            .is_ok()
    }

    pub fn bind_count(&self) -> u32 {
        self.bind_count.load(Ordering::SeqCst)
    }

    /// Returns the new count.
    pub fn increment_bind(&self) -> u32 {
        self.bind_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Saturates at zero. Returns the new count.
    pub fn decrement_bind(&self) -> u32 {
        match self
            .bind_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => 0,
        }
    }

    pub fn is_self_launch(&self) -> bool {
        self.self_launch.load(Ordering::SeqCst)
    }

    pub(crate) fn set_self_launch(&self, enabled: bool) {
        self.self_launch.store(enabled, Ordering::SeqCst);
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Run `f` against the plugin instance.
    ///
    /// The instance lock is held for the duration; `f` must not re-enter
    /// the multiplexer for this record.
    pub(crate) fn with_instance<R>(&self, f: impl FnOnce(&mut dyn PluginService) -> R) -> R {
        let mut instance = self.instance.lock();
        f(instance.as_mut())
    }
}

impl fmt::Debug for ServiceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRecord")
            .field("component", &self.component)
            .field("proxy", self.proxy.component())
            .field("state", &self.state())
            .field("bind_count", &self.bind_count())
            .field("self_launch", &self.is_self_launch())
            .finish()
    }
}
