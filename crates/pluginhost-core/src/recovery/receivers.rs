//! Bus receivers driving parked navigations.

use std::sync::Weak;

use tracing::trace;
use uuid::Uuid;

use pluginhost_protocols::Broadcast;

use super::coordinator::RecoveryCoordinator;
use crate::broadcast::{BroadcastBus, BroadcastReceiver, ReceiverId};

pub(super) struct ReadinessReceiver {
    coordinator: Weak<RecoveryCoordinator>,
    navigation: Uuid,
}

impl ReadinessReceiver {
    pub(super) fn new(coordinator: Weak<RecoveryCoordinator>, navigation: Uuid) -> Self {
        Self {
            coordinator,
            navigation,
        }
    }
}

impl BroadcastReceiver for ReadinessReceiver {
    fn on_receive(&self, bus: &BroadcastBus, id: ReceiverId, _broadcast: &Broadcast) {
        trace!(receiver = %id, navigation = %self.navigation, "readiness signal");
        match self.coordinator.upgrade() {
            Some(coordinator) => coordinator.on_service_connected(id, self.navigation),
            None => {
                bus.unregister(id);
            }
        }
    }
}

pub(super) struct TerminalReceiver {
    coordinator: Weak<RecoveryCoordinator>,
    navigation: Uuid,
}

impl TerminalReceiver {
    pub(super) fn new(coordinator: Weak<RecoveryCoordinator>, navigation: Uuid) -> Self {
        Self {
            coordinator,
            navigation,
        }
    }
}

impl BroadcastReceiver for TerminalReceiver {
    fn on_receive(&self, bus: &BroadcastBus, id: ReceiverId, broadcast: &Broadcast) {
        trace!(receiver = %id, navigation = %self.navigation, action = %broadcast.action, "terminal signal");
        match self.coordinator.upgrade() {
            Some(coordinator) => coordinator.on_terminal(self.navigation, broadcast),
            None => {
                bus.unregister(id);
            }
        }
    }
}
