//! Parks launches that arrive before the plugin runtime is ready.
//!
//! After a process restart the OS recreates proxy activities before any
//! plugin runtime is loaded. Each such creation becomes a parked
//! navigation: its saved state goes into the [`TicketStore`], a
//! placeholder stays on screen, and two receivers on the
//! [`BroadcastBus`] drive it to completion:
//!
//! - the readiness receiver re-issues the launch once the package-manager
//!   service is connected and the host reports the package ready;
//! - the terminal receiver finishes the placeholder once the plugin loaded
//!   (after redelivery) or failed to start.
//!
//! Readiness receivers get increasing priorities within a process
//! generation. The OS recreates the top of a stack first, so the bottom
//! registers last and is redelivered first.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pluginhost_config::RecoveryConfig;
use pluginhost_protocols::actions::{action, extra};
use pluginhost_protocols::{
    Broadcast, ComponentHandle, Intent, Launcher, RecoveryCallback, SavedState,
    ServiceConnectivity,
};

use super::receivers::{ReadinessReceiver, TerminalReceiver};
use super::ticket::{TicketKind, TicketStore};
use crate::broadcast::{BroadcastBus, ReceiverId};
use crate::service::redirected_target;

/// Whether the host can serve `package` right now.
pub type ReadyPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Lifecycle of one parked navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationState {
    Requested,
    Parked,
    Redelivered,
    Finished,
    Failed,
}

impl NavigationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NavigationState::Finished | NavigationState::Failed)
    }
}

/// What the caller of an intercepted callback should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// The runtime is ready; run the callback normally.
    Proceed,
    /// Show the placeholder and wait.
    Parked {
        navigation: Uuid,
        ticket: Option<Uuid>,
    },
}

pub(super) struct Navigation {
    pub(super) package: String,
    relaunch: Mutex<Intent>,
    placeholder: Arc<dyn ComponentHandle>,
    state: Mutex<NavigationState>,
    loaded: AtomicBool,
    tickets: Mutex<Vec<Uuid>>,
    receivers: Mutex<Vec<ReceiverId>>,
}

pub struct RecoveryCoordinator {
    this: Weak<RecoveryCoordinator>,
    config: RecoveryConfig,
    bus: Arc<BroadcastBus>,
    launcher: Arc<dyn Launcher>,
    connectivity: Arc<dyn ServiceConnectivity>,
    host_ready: ReadyPredicate,
    callback: RwLock<Option<Arc<dyn RecoveryCallback>>>,
    tickets: TicketStore,
    navigations: DashMap<Uuid, Arc<Navigation>>,
    next_priority: AtomicI32,
}

impl RecoveryCoordinator {
    pub fn new(
        config: RecoveryConfig,
        bus: Arc<BroadcastBus>,
        launcher: Arc<dyn Launcher>,
        connectivity: Arc<dyn ServiceConnectivity>,
        host_ready: ReadyPredicate,
    ) -> Arc<Self> {
        let base = config.base_priority;
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            config,
            bus,
            launcher,
            connectivity,
            host_ready,
            callback: RwLock::new(None),
            tickets: TicketStore::new(),
            navigations: DashMap::new(),
            next_priority: AtomicI32::new(base),
        })
    }

    pub fn set_callback(&self, callback: Arc<dyn RecoveryCallback>) {
        *self.callback.write() = Some(callback);
    }

    pub fn tickets(&self) -> &TicketStore {
        &self.tickets
    }

    /// Both readiness conditions hold for `package`.
    pub fn is_ready(&self, package: &str) -> bool {
        self.connectivity.is_connected() && (self.host_ready)(package)
    }

    /// Intercept the create callback of a recreated proxy activity.
    ///
    /// `intent` is the intent the OS recreated the proxy with, `icicle` the
    /// state it passed along and `placeholder` the proxy itself.
    pub fn intercept_create(
        &self,
        intent: &Intent,
        icicle: Option<SavedState>,
        placeholder: Arc<dyn ComponentHandle>,
    ) -> Interception {
        let Some(package) = target_package(intent) else {
            return Interception::Proceed;
        };
        if self.is_ready(&package) {
            return Interception::Proceed;
        }

        let id = Uuid::new_v4();
        debug!(navigation = %id, plugin = %package, state = ?NavigationState::Requested, "intercepted create");

        let mut relaunch = intent.clone();
        let mut tickets = Vec::new();
        let ticket = icicle.map(|state| {
            let ticket = self.tickets.stash(TicketKind::Icicle, state);
            relaunch.put_extra(extra::RECOVERY_ICICLE_ID, ticket.to_string());
            tickets.push(ticket);
            ticket
        });
        if self.config.show_loading {
            relaunch.put_extra(extra::SHOW_LOADING, true);
        }

        let navigation = Arc::new(Navigation {
            package: package.clone(),
            relaunch: Mutex::new(relaunch),
            placeholder,
            state: Mutex::new(NavigationState::Parked),
            loaded: AtomicBool::new(false),
            tickets: Mutex::new(tickets),
            receivers: Mutex::new(Vec::new()),
        });
        self.navigations.insert(id, navigation.clone());

        let priority = self.next_priority.fetch_add(1, Ordering::SeqCst);
        let readiness = self.bus.register(
            &[action::SERVICE_CONNECTED],
            priority,
            Arc::new(ReadinessReceiver::new(self.this.clone(), id)),
        );
        let terminal = self.bus.register(
            &[action::PLUGIN_LOADED, action::START_PLUGIN_ERROR],
            priority,
            Arc::new(TerminalReceiver::new(self.this.clone(), id)),
        );
        navigation.receivers.lock().extend([readiness, terminal]);

        info!(navigation = %id, plugin = %package, priority, ?ticket, "parked navigation");

        if self.config.request_plugin_start {
            self.bus.send(
                &Broadcast::new(action::START_PLUGIN).with_extra(extra::TARGET_PACKAGE, package),
            );
        }

        Interception::Parked {
            navigation: id,
            ticket,
        }
    }

    /// Intercept the restore callback of a parked navigation's placeholder.
    ///
    /// Returns the ticket id, or `None` if the navigation was already
    /// redelivered or is unknown.
    pub fn intercept_restore(&self, navigation: Uuid, state: SavedState) -> Option<Uuid> {
        let nav = self.navigation(navigation)?;
        if *nav.state.lock() != NavigationState::Parked {
            return None;
        }
        let ticket = self.tickets.stash(TicketKind::SavedState, state);
        nav.relaunch
            .lock()
            .put_extra(extra::RECOVERY_SAVED_STATE_ID, ticket.to_string());
        nav.tickets.lock().push(ticket);
        debug!(%navigation, %ticket, "stashed restore state");
        Some(ticket)
    }

    /// Take the icicle referenced by `intent`, removing the reference.
    pub fn consume_icicle(&self, intent: &mut Intent) -> Option<SavedState> {
        self.consume(intent, extra::RECOVERY_ICICLE_ID, TicketKind::Icicle)
    }

    /// Take the restore state referenced by `intent`, removing the reference.
    pub fn consume_saved_state(&self, intent: &mut Intent) -> Option<SavedState> {
        self.consume(intent, extra::RECOVERY_SAVED_STATE_ID, TicketKind::SavedState)
    }

    fn consume(&self, intent: &mut Intent, key: &str, kind: TicketKind) -> Option<SavedState> {
        let value = intent.remove_extra(key)?;
        let id = value.as_str().and_then(|raw| Uuid::parse_str(raw).ok())?;
        let ticket = self.tickets.take_kind(id, kind)?;
        debug!(ticket = %id, ?kind, "consumed saved state");
        Some(ticket.state)
    }

    pub fn navigation_state(&self, navigation: Uuid) -> Option<NavigationState> {
        self.navigation(navigation).map(|nav| *nav.state.lock())
    }

    /// Navigations not yet finished or failed.
    pub fn pending_count(&self) -> usize {
        self.navigations
            .iter()
            .filter(|entry| !entry.state.lock().is_terminal())
            .count()
    }

    /// Start a new process generation: priorities restart from the
    /// configured base and settled navigations are forgotten.
    pub fn reset_generation(&self) {
        self.next_priority
            .store(self.config.base_priority, Ordering::SeqCst);
        self.navigations
            .retain(|_, nav| !nav.state.lock().is_terminal());
        debug!(base = self.config.base_priority, "recovery generation reset");
    }

    pub(super) fn navigation(&self, id: Uuid) -> Option<Arc<Navigation>> {
        self.navigations.get(&id).map(|entry| entry.clone())
    }

    /// Readiness signal for `id`, delivered to `receiver`.
    pub(super) fn on_service_connected(&self, receiver: ReceiverId, id: Uuid) {
        let Some(nav) = self.navigation(id) else {
            self.bus.unregister(receiver);
            return;
        };
        if !self.redeliver(id, &nav) {
            return;
        }
        if nav.loaded.load(Ordering::SeqCst) {
            self.settle(id, &nav, true);
        }
    }

    /// Terminal signal for `id`.
    pub(super) fn on_terminal(&self, id: Uuid, broadcast: &Broadcast) {
        let Some(nav) = self.navigation(id) else {
            return;
        };
        if broadcast.string_extra(extra::TARGET_PACKAGE) != Some(nav.package.as_str()) {
            return;
        }

        if broadcast.action == action::START_PLUGIN_ERROR {
            self.settle(id, &nav, false);
            return;
        }

        nav.loaded.store(true, Ordering::SeqCst);
        let state = *nav.state.lock();
        // Loading may be what the host was waiting for.
        if state == NavigationState::Redelivered || self.redeliver(id, &nav) {
            self.settle(id, &nav, true);
        }
    }

    /// Re-issue the parked launch if both readiness conditions hold.
    fn redeliver(&self, id: Uuid, nav: &Navigation) -> bool {
        if !self.is_ready(&nav.package) {
            debug!(navigation = %id, plugin = %nav.package, "not ready yet");
            return false;
        }
        {
            let mut state = nav.state.lock();
            if *state != NavigationState::Parked {
                return false;
            }
            *state = NavigationState::Redelivered;
        }
        // The first receiver registered for this navigation is the readiness one.
        let readiness = nav.receivers.lock().first().copied();
        if let Some(readiness) = readiness {
            self.bus.unregister(readiness);
        }
        let intent = nav.relaunch.lock().clone();
        info!(navigation = %id, plugin = %nav.package, "redelivering parked launch");
        self.launcher.launch(intent);
        true
    }

    /// Finish the placeholder exactly once and notify the callback.
    fn settle(&self, id: Uuid, nav: &Navigation, success: bool) {
        {
            let mut state = nav.state.lock();
            if state.is_terminal() {
                return;
            }
            *state = if success {
                NavigationState::Finished
            } else {
                NavigationState::Failed
            };
        }

        let receivers: Vec<ReceiverId> = nav.receivers.lock().drain(..).collect();
        for receiver in receivers {
            self.bus.unregister(receiver);
        }
        if !success {
            let tickets: Vec<Uuid> = nav.tickets.lock().drain(..).collect();
            for ticket in tickets {
                self.tickets.take(ticket);
            }
        }
        if !nav.placeholder.is_finishing() {
            nav.placeholder.finish();
        }

        if success {
            info!(navigation = %id, plugin = %nav.package, "recovery finished");
        } else {
            warn!(navigation = %id, plugin = %nav.package, "recovery failed");
        }
        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            callback.on_recovery_finished(&nav.package, success);
        }
    }
}

fn target_package(intent: &Intent) -> Option<String> {
    redirected_target(intent)
        .map(|(component, _)| component.package)
        .or_else(|| intent.target_package().map(str::to_string))
}
