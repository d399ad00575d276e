//! Process-local broadcast bus.
//!
//! Receivers register for a set of actions with an explicit priority and
//! are invoked synchronously, highest priority first. Receivers may
//! unregister themselves (or others) from inside a delivery; the bus holds
//! no lock while a receiver runs.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use pluginhost_protocols::Broadcast;

const OBSERVER_CAPACITY: usize = 64;

/// Registration handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ReceiverId(u64);

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "receiver-{}", self.0)
    }
}

/// A registered broadcast receiver.
pub trait BroadcastReceiver: Send + Sync {
    /// `id` is this receiver's own registration.
    fn on_receive(&self, bus: &BroadcastBus, id: ReceiverId, broadcast: &Broadcast);
}

struct Registration {
    id: ReceiverId,
    priority: i32,
    actions: Vec<String>,
    receiver: Arc<dyn BroadcastReceiver>,
}

pub struct BroadcastBus {
    next_id: AtomicU64,
    registrations: RwLock<Vec<Registration>>,
    observers: broadcast::Sender<Broadcast>,
}

impl BroadcastBus {
    pub fn new() -> Self {
        let (observers, _) = broadcast::channel(OBSERVER_CAPACITY);
        Self {
            next_id: AtomicU64::new(1),
            registrations: RwLock::new(Vec::new()),
            observers,
        }
    }

    pub fn register(
        &self,
        actions: &[&str],
        priority: i32,
        receiver: Arc<dyn BroadcastReceiver>,
    ) -> ReceiverId {
        let id = ReceiverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(%id, priority, ?actions, "registered receiver");
        self.registrations.write().push(Registration {
            id,
            priority,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            receiver,
        });
        id
    }

    pub fn unregister(&self, id: ReceiverId) -> bool {
        let mut registrations = self.registrations.write();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        let removed = registrations.len() != before;
        if removed {
            debug!(%id, "unregistered receiver");
        }
        removed
    }

    pub fn is_registered(&self, id: ReceiverId) -> bool {
        self.registrations.read().iter().any(|r| r.id == id)
    }

    pub fn receiver_count(&self) -> usize {
        self.registrations.read().len()
    }

    /// Deliver `broadcast` to every matching receiver, highest priority
    /// first. Returns the number of receivers invoked.
    pub fn send(&self, broadcast: &Broadcast) -> usize {
        let mut targets: Vec<(ReceiverId, i32, Arc<dyn BroadcastReceiver>)> = self
            .registrations
            .read()
            .iter()
            .filter(|r| r.actions.iter().any(|a| a == &broadcast.action))
            .map(|r| (r.id, r.priority, r.receiver.clone()))
            .collect();
        // Stable: equal priorities keep registration order.
        targets.sort_by(|a, b| b.1.cmp(&a.1));

        let mut delivered = 0;
        for (id, priority, receiver) in targets {
            // An earlier receiver may have unregistered this one.
            if !self.is_registered(id) {
                continue;
            }
            trace!(%id, priority, action = %broadcast.action, "delivering broadcast");
            receiver.on_receive(self, id, broadcast);
            delivered += 1;
        }

        let _ = self.observers.send(broadcast.clone());
        debug!(action = %broadcast.action, delivered, "broadcast sent");
        delivered
    }

    /// Observe every broadcast sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.observers.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}
