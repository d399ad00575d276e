//! The object owning every registry of one hosting process.
//!
//! Replaces process-wide statics: construct one `PluginHost` per process
//! and pass it (or the registries it hands out) to the proxies.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pluginhost_config::HostConfig;
use pluginhost_protocols::actions::{action, extra};
use pluginhost_protocols::{
    Broadcast, ComponentHandle, ComponentName, ErrorCode, ErrorSink, Intent, Launcher,
    PluginError, PluginRuntime, RuntimeResolver, ServiceConnectivity,
};

use crate::broadcast::{BroadcastBus, BroadcastReceiver, ReceiverId};
use crate::launch::{LaunchDecision, LaunchModeResolver};
use crate::pending::PendingIntents;
use crate::record::ComponentRecord;
use crate::recovery::RecoveryCoordinator;
use crate::service::{ProxyPool, ServiceMultiplexer, ServiceState, redirect_intent};
use crate::stack::{GlobalStackRegistry, PluginDirectory, PluginStacks};

/// Host lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum HostState {
    Running = 0,
    ShuttingDown = 1,
    Stopped = 2,
}

impl From<u8> for HostState {
    fn from(v: u8) -> Self {
        match v {
            1 => HostState::ShuttingDown,
            2 => HostState::Stopped,
            _ => HostState::Running,
        }
    }
}

/// External collaborators the host drives.
#[derive(Clone)]
pub struct HostCollaborators {
    pub runtimes: Arc<dyn RuntimeResolver>,
    pub launcher: Arc<dyn Launcher>,
    pub errors: Arc<dyn ErrorSink>,
    pub connectivity: Arc<dyn ServiceConnectivity>,
}

/// Result of [`PluginHost::start_activity`].
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// The runtime is not ready; the request waits in the pending cache.
    Parked(Uuid),
    /// The launch was resolved and handed to the launcher.
    Launched {
        decision: LaunchDecision,
        intent: Intent,
    },
}

/// Serializable view of every stack.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StackDump {
    /// Physical stacks by system name, bottom to top.
    pub physical: BTreeMap<String, Vec<String>>,
    pub plugins: BTreeMap<String, PluginDump>,
    pub pending: usize,
    pub loading: usize,
    pub services: Vec<ServiceDump>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PluginDump {
    pub focused: String,
    pub last_focused: Option<String>,
    /// Logical stacks by task name, bottom to top.
    pub tasks: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceDump {
    pub component: String,
    pub proxy: String,
    pub state: ServiceState,
    pub bind_count: u32,
    /// Processes the proxy pool has assigned to this service's proxy.
    pub processes: Vec<String>,
}

struct QuitReceiver {
    services: Arc<ServiceMultiplexer>,
}

impl BroadcastReceiver for QuitReceiver {
    fn on_receive(&self, _bus: &BroadcastBus, _id: ReceiverId, broadcast: &Broadcast) {
        self.services.quit(broadcast.bool_extra(extra::KILL_PROCESS));
    }
}

pub struct PluginHost {
    config: HostConfig,
    state: AtomicU8,
    collaborators: HostCollaborators,
    activity_proxy: ComponentName,
    bus: Arc<BroadcastBus>,
    global: Arc<GlobalStackRegistry>,
    plugins: Arc<PluginDirectory>,
    pending: Arc<PendingIntents>,
    resolver: LaunchModeResolver,
    services: Arc<ServiceMultiplexer>,
    proxies: ProxyPool,
    recovery: Arc<RecoveryCoordinator>,
    quit_receiver: ReceiverId,
}

impl PluginHost {
    pub fn new(config: HostConfig, collaborators: HostCollaborators) -> Self {
        let host_package = config.host.package.clone();
        let bus = Arc::new(BroadcastBus::new());
        let global = Arc::new(GlobalStackRegistry::new(host_package.clone()));
        let plugins = Arc::new(PluginDirectory::new());
        let pending = Arc::new(PendingIntents::new());
        let resolver = LaunchModeResolver::new(global.clone(), plugins.clone(), pending.clone());
        let services = Arc::new(ServiceMultiplexer::new(
            host_package.clone(),
            collaborators.runtimes.clone(),
            collaborators.errors.clone(),
        ));

        let runtimes = collaborators.runtimes.clone();
        let recovery = RecoveryCoordinator::new(
            config.recovery.clone(),
            bus.clone(),
            collaborators.launcher.clone(),
            collaborators.connectivity.clone(),
            Arc::new(move |package: &str| runtimes.is_runtime_ready(package)),
        );

        let quit_receiver = bus.register(
            &[action::QUIT_SERVICE],
            i32::MAX,
            Arc::new(QuitReceiver {
                services: services.clone(),
            }),
        );

        info!(host = %host_package, proxies = config.proxy.services.len(), "plugin host created");
        Self {
            activity_proxy: ComponentName::new(host_package, config.proxy.activity.clone()),
            proxies: ProxyPool::from_config(&config),
            config,
            state: AtomicU8::new(HostState::Running as u8),
            collaborators,
            bus,
            global,
            plugins,
            pending,
            resolver,
            services,
            recovery,
            quit_receiver,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn state(&self) -> HostState {
        HostState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == HostState::Running
    }

    pub fn bus(&self) -> &Arc<BroadcastBus> {
        &self.bus
    }

    pub fn global_stacks(&self) -> &Arc<GlobalStackRegistry> {
        &self.global
    }

    pub fn pending(&self) -> &Arc<PendingIntents> {
        &self.pending
    }

    pub fn services(&self) -> &Arc<ServiceMultiplexer> {
        &self.services
    }

    pub fn proxies(&self) -> &ProxyPool {
        &self.proxies
    }

    pub fn recovery(&self) -> &Arc<RecoveryCoordinator> {
        &self.recovery
    }

    pub fn plugin_stacks(&self, package: &str) -> Option<Arc<PluginStacks>> {
        self.plugins.get(package).map(|entry| entry.clone())
    }

    /// Stacks of `package`, created and focused on its default task on
    /// first use.
    pub fn attach_plugin(&self, package: &str) -> Arc<PluginStacks> {
        self.plugins
            .entry(package.to_string())
            .or_insert_with(|| {
                info!(plugin = %package, "attached plugin");
                Arc::new(PluginStacks::new(package))
            })
            .clone()
    }

    /// Start a plugin activity.
    ///
    /// A runtime that is not ready is a normal outcome: the request is
    /// parked until [`on_plugin_loaded`](Self::on_plugin_loaded).
    pub fn start_activity(&self, intent: Intent) -> Result<StartOutcome, PluginError> {
        if !self.is_running() {
            return Err(PluginError::RuntimeNotReady(self.config.host.package.clone()));
        }
        let Some(target) = intent.component.clone() else {
            let err = PluginError::InvalidIntent("activity intent has no component".to_string());
            self.report("", &err);
            return Err(err);
        };
        let package = target.package.as_str();

        let runtimes = &self.collaborators.runtimes;
        if !runtimes.is_installed(package) {
            let err = PluginError::NotInstalled(package.to_string());
            self.report(package, &err);
            return Err(err);
        }

        let runtime = match runtimes.resolve_runtime(package) {
            Some(runtime) if runtimes.is_runtime_ready(package) => runtime,
            _ => {
                let id = self.pending.park(package, intent);
                self.request_plugin_start(package);
                return Ok(StartOutcome::Parked(id));
            }
        };

        let (decision, intent) = self.dispatch(runtime.as_ref(), intent)?;
        Ok(StartOutcome::Launched { decision, intent })
    }

    /// Resolve the launch mode, redirect to the activity proxy and launch.
    fn dispatch(
        &self,
        runtime: &dyn PluginRuntime,
        mut intent: Intent,
    ) -> Result<(LaunchDecision, Intent), PluginError> {
        let target = intent
            .component
            .clone()
            .ok_or_else(|| PluginError::InvalidIntent("activity intent has no component".to_string()))?;
        let Some(info) = runtime.activity_info(&target.class) else {
            let err = PluginError::ComponentNotFound(target.to_string());
            self.report(&target.package, &err);
            return Err(err);
        };

        let stacks = self.attach_plugin(&target.package);
        let decision = self.resolver.resolve(&stacks, &info, &mut intent);
        let process = info
            .process
            .clone()
            .unwrap_or_else(|| self.config.host.process.clone());
        let redirected = redirect_intent(&self.activity_proxy, &target, &process, &intent);
        debug!(component = %target, %process, outcome = decision.outcome.name(), "launching via proxy");
        self.collaborators.launcher.launch(redirected.clone());
        Ok((decision, redirected))
    }

    fn request_plugin_start(&self, package: &str) {
        if self.config.recovery.request_plugin_start {
            self.bus.send(
                &Broadcast::new(action::START_PLUGIN).with_extra(extra::TARGET_PACKAGE, package),
            );
        }
    }

    /// The runtime of `package` finished loading.
    ///
    /// Cached requests are dispatched oldest first and move to the loading
    /// list until their activity is created. Returns how many were
    /// dispatched.
    pub fn on_plugin_loaded(&self, package: &str) -> usize {
        let Some(runtime) = self.collaborators.runtimes.resolve_runtime(package) else {
            warn!(plugin = %package, "loaded signal without a runtime");
            return 0;
        };
        self.attach_plugin(package);

        let mut dispatched = 0;
        for request in self.pending.take_cached(package) {
            // Dispatch before listing as loading so the request cannot match
            // itself during launch-mode resolution.
            match self.dispatch(runtime.as_ref(), request.intent.clone()) {
                Ok(_) => {
                    self.pending.begin_loading(request);
                    dispatched += 1;
                }
                Err(err) => {
                    warn!(plugin = %package, request = %request.id, error = %err, "dropping pending request");
                }
            }
        }

        self.collaborators
            .errors
            .deliver(true, package, ErrorCode::Success, "plugin loaded");
        self.bus.send(&Broadcast::new(action::PLUGIN_LOADED).with_extra(extra::TARGET_PACKAGE, package));
        info!(plugin = %package, dispatched, "plugin loaded");
        dispatched
    }

    /// The runtime of `package` failed to start. Returns how many pending
    /// requests were dropped.
    pub fn on_plugin_load_failed(&self, package: &str, message: &str) -> usize {
        let dropped = self.pending.clear(package);
        self.collaborators
            .errors
            .deliver(false, package, ErrorCode::RuntimeNotReady, message);
        self.bus.send(
            &Broadcast::new(action::START_PLUGIN_ERROR)
                .with_extra(extra::TARGET_PACKAGE, package)
                .with_extra(extra::ERROR_MESSAGE, message),
        );
        warn!(plugin = %package, dropped, %message, "plugin failed to load");
        dropped
    }

    /// The package-manager service connection is up.
    pub fn on_service_connected(&self) -> usize {
        self.bus.send(&Broadcast::new(action::SERVICE_CONNECTED))
    }

    /// Deliver `broadcast` to the registered receivers.
    pub fn send_broadcast(&self, broadcast: &Broadcast) -> usize {
        self.bus.send(broadcast)
    }

    /// An activity fronting `component` was created.
    ///
    /// Pushes the record on the plugin's focused stack and its physical
    /// counterpart, and retires the matching loading request.
    pub fn on_activity_created(
        &self,
        component: ComponentName,
        handle: Arc<dyn ComponentHandle>,
        intent: Option<Intent>,
    ) -> Arc<ComponentRecord> {
        let mut record = ComponentRecord::new(component, handle);
        if let Some(intent) = intent {
            record = record.with_intent(intent);
        }
        let record = Arc::new(record);
        let package = record.package().to_string();

        let stacks = self.attach_plugin(&package);
        let logical = stacks.focused();
        let physical = self.global.find_associated_stack(&package, &logical);
        physical.push(record.clone());
        logical.push(record.clone());
        self.pending.complete(record.component());

        debug!(
            component = %record.component(),
            task = %logical.name(),
            physical = %physical.name(),
            "activity created"
        );
        record
    }

    /// The activity with record `id` was destroyed. Returns whether it was
    /// known.
    pub fn on_activity_destroyed(&self, id: Uuid) -> bool {
        let logical = {
            let _guard = self.global.relocating();
            self.plugins
                .iter()
                .find_map(|entry| entry.stack_of(id))
                .and_then(|stack| stack.remove(id))
        };
        let physical = self.global.remove_record(id);
        if logical.is_some() || physical {
            debug!(record = %id, "activity destroyed");
        }
        logical.is_some() || physical
    }

    /// Finish every activity of `package`, destroy its unbound services and
    /// drop its registry. Returns how many activities were finished.
    pub fn unload_plugin(&self, package: &str) -> usize {
        let Some((_, stacks)) = self.plugins.remove(package) else {
            return 0;
        };
        let records = stacks.clear(true);
        for record in &records {
            self.global.remove_record(record.id());
        }
        self.pending.clear(package);
        for service in self.services.records() {
            if service.package() == package {
                self.services.try_destroy(&service);
            }
        }
        info!(plugin = %package, finished = records.len(), "plugin unloaded");
        records.len()
    }

    /// Stop every service and unload every plugin.
    pub fn shutdown(&self) {
        if self
            .state
            .compare_exchange(
                HostState::Running as u8,
                HostState::ShuttingDown as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return;
        }
        info!("shutting down plugin host");

        self.services.quit(false);
        let packages: Vec<String> = self.plugins.iter().map(|entry| entry.key().clone()).collect();
        for package in packages {
            self.unload_plugin(&package);
        }
        self.bus.unregister(self.quit_receiver);

        self.state.store(HostState::Stopped as u8, Ordering::SeqCst);
        info!("plugin host stopped");
    }

    pub fn dump_stacks(&self) -> StackDump {
        let physical = self
            .global
            .stacks()
            .into_iter()
            .map(|stack| (stack.name().to_string(), stack.snapshot()))
            .collect();

        let plugins = self
            .plugins
            .iter()
            .map(|entry| {
                let stacks = entry.value();
                let dump = PluginDump {
                    focused: stacks.focused().name().to_string(),
                    last_focused: stacks.last_focused().map(|s| s.name().to_string()),
                    tasks: stacks
                        .stacks()
                        .into_iter()
                        .map(|stack| (stack.name().to_string(), stack.snapshot()))
                        .collect(),
                };
                (entry.key().clone(), dump)
            })
            .collect();

        let services = self
            .services
            .records()
            .iter()
            .map(|record| ServiceDump {
                component: record.component().to_string(),
                proxy: record.proxy().component().to_string(),
                state: record.state(),
                bind_count: record.bind_count(),
                processes: self.proxies.processes_of(record.proxy().component()),
            })
            .collect();

        StackDump {
            physical,
            plugins,
            pending: self.pending.cached_total(),
            loading: self.pending.loading_len(),
            services,
        }
    }

    fn report(&self, package: &str, err: &PluginError) {
        warn!(plugin = %package, code = %err.code(), error = %err, "launch failed");
        self.collaborators
            .errors
            .deliver(false, package, err.code(), &err.to_string());
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
