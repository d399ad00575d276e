//! Test doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use pluginhost_protocols::{
    ActivityInfo, AttachContext, ClassResolver, ComponentHandle, ComponentName, ErrorCode,
    ErrorSink, Intent, LaunchMode, Launcher, PluginError, PluginRuntime, PluginService,
    RecoveryCallback, Resolution, RuntimeResolver, ServiceConnectivity, ServiceConstructor,
    ServiceHost, StartResult,
};

use crate::record::ComponentRecord;

/// `component("com.p", "A")` is `com.p/com.p.A`.
pub(crate) fn component(package: &str, class: &str) -> ComponentName {
    ComponentName::new(package, format!("{}.{}", package, class))
}

pub(crate) fn record(package: &str, class: &str) -> (Arc<ComponentRecord>, Arc<MockHandle>) {
    let handle = Arc::new(MockHandle::new());
    let record = Arc::new(ComponentRecord::new(component(package, class), handle.clone()));
    (record, handle)
}

/// Short class names of a stack, bottom to top.
pub(crate) fn names(stack: &crate::stack::TaskStack) -> Vec<String> {
    stack
        .records()
        .iter()
        .rev()
        .map(|r| r.component().class.rsplit('.').next().unwrap_or_default().to_string())
        .collect()
}

#[derive(Default)]
pub(crate) struct MockHandle {
    finishing: AtomicBool,
    finish_calls: AtomicUsize,
    fronted: Mutex<Option<ComponentName>>,
}

impl MockHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fronting(component: ComponentName) -> Self {
        let handle = Self::default();
        *handle.fronted.lock() = Some(component);
        handle
    }

    pub(crate) fn finish_calls(&self) -> usize {
        self.finish_calls.load(Ordering::SeqCst)
    }
}

impl ComponentHandle for MockHandle {
    fn finish(&self) {
        self.finish_calls.fetch_add(1, Ordering::SeqCst);
        self.finishing.store(true, Ordering::SeqCst);
    }

    fn is_finishing(&self) -> bool {
        self.finishing.load(Ordering::SeqCst)
    }

    fn fronted_component(&self) -> Option<ComponentName> {
        self.fronted.lock().clone()
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) reports: Mutex<Vec<(bool, String, ErrorCode, String)>>,
}

impl RecordingSink {
    pub(crate) fn codes(&self) -> Vec<ErrorCode> {
        self.reports.lock().iter().map(|r| r.2).collect()
    }
}

impl ErrorSink for RecordingSink {
    fn deliver(&self, success: bool, package: &str, code: ErrorCode, message: &str) {
        self.reports
            .lock()
            .push((success, package.to_string(), code, message.to_string()));
    }
}

#[derive(Default)]
pub(crate) struct RecordingLauncher {
    pub(crate) launched: Mutex<Vec<Intent>>,
}

impl RecordingLauncher {
    pub(crate) fn count(&self) -> usize {
        self.launched.lock().len()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, intent: Intent) {
        self.launched.lock().push(intent);
    }
}

pub(crate) struct MockServiceHost {
    component: ComponentName,
    pub(crate) stops: AtomicUsize,
    pub(crate) killed: AtomicBool,
}

impl MockServiceHost {
    pub(crate) fn new(class: &str) -> Self {
        Self {
            component: ComponentName::new("com.example.host", format!("com.example.host.{}", class)),
            stops: AtomicUsize::new(0),
            killed: AtomicBool::new(false),
        }
    }

    pub(crate) fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl ServiceHost for MockServiceHost {
    fn component(&self) -> &ComponentName {
        &self.component
    }

    fn stop_self(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn kill_process(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }
}

/// Behavior of services built by [`ServiceScript::constructor`].
#[derive(Clone, Default)]
pub(crate) struct ServiceScript {
    pub(crate) events: Arc<Mutex<Vec<String>>>,
    pub(crate) start_result: StartResult,
    pub(crate) fail_create: bool,
    pub(crate) fail_start: bool,
    pub(crate) fail_bind: bool,
}

impl ServiceScript {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub(crate) fn constructor(&self) -> ServiceConstructor {
        let script = self.clone();
        Arc::new(move |ctx: &AttachContext| {
            script.events.lock().push(format!("attach:{}", ctx.proxy.class));
            Ok::<_, PluginError>(Box::new(MockService {
                class: ctx.component.class.clone(),
                script: script.clone(),
            }) as Box<dyn PluginService>)
        })
    }
}

struct MockService {
    class: String,
    script: ServiceScript,
}

impl PluginService for MockService {
    fn on_create(&mut self) -> Result<(), PluginError> {
        self.script.events.lock().push("create".to_string());
        if self.script.fail_create {
            return Err(PluginError::lifecycle(&self.class, "on_create", "boom"));
        }
        Ok(())
    }

    fn on_start_command(&mut self, _intent: &Intent, start_id: u32) -> Result<StartResult, PluginError> {
        self.script.events.lock().push(format!("start:{}", start_id));
        if self.script.fail_start {
            return Err(PluginError::lifecycle(&self.class, "on_start_command", "boom"));
        }
        Ok(self.script.start_result)
    }

    fn on_bind(&mut self, _intent: &Intent) -> Result<(), PluginError> {
        self.script.events.lock().push("bind".to_string());
        if self.script.fail_bind {
            return Err(PluginError::lifecycle(&self.class, "on_bind", "boom"));
        }
        Ok(())
    }

    fn on_unbind(&mut self, _intent: &Intent) -> bool {
        self.script.events.lock().push("unbind".to_string());
        false
    }

    fn on_destroy(&mut self) {
        self.script.events.lock().push("destroy".to_string());
    }
}

pub(crate) struct MapResolver {
    namespace: String,
    services: HashMap<String, ServiceConstructor>,
}

impl MapResolver {
    pub(crate) fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            services: HashMap::new(),
        }
    }

    pub(crate) fn with_service(mut self, class: &str, ctor: ServiceConstructor) -> Self {
        self.services.insert(class.to_string(), ctor);
        self
    }
}

impl ClassResolver for MapResolver {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn resolve_service(&self, class: &str) -> Resolution<ServiceConstructor> {
        match self.services.get(class) {
            Some(ctor) => Resolution::Found(ctor.clone()),
            None => Resolution::NotFound,
        }
    }
}

pub(crate) struct MockRuntime {
    package: String,
    activities: HashMap<String, ActivityInfo>,
    resolvers: Vec<Arc<dyn ClassResolver>>,
}

impl MockRuntime {
    pub(crate) fn new(package: &str) -> Self {
        Self {
            package: package.to_string(),
            activities: HashMap::new(),
            resolvers: Vec::new(),
        }
    }

    pub(crate) fn with_activity(mut self, class: &str, mode: LaunchMode, affinity: Option<&str>) -> Self {
        let mut info = ActivityInfo::new(component(&self.package, class), mode);
        info.task_affinity = affinity.map(str::to_string);
        self.activities.insert(info.component.class.clone(), info);
        self
    }

    pub(crate) fn with_resolver(mut self, resolver: Arc<dyn ClassResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }
}

impl PluginRuntime for MockRuntime {
    fn package(&self) -> &str {
        &self.package
    }

    fn activity_info(&self, class: &str) -> Option<ActivityInfo> {
        self.activities.get(class).cloned()
    }

    fn class_resolvers(&self) -> Vec<Arc<dyn ClassResolver>> {
        self.resolvers.clone()
    }
}

#[derive(Default)]
pub(crate) struct MockRuntimeResolver {
    runtimes: Mutex<HashMap<String, Arc<dyn PluginRuntime>>>,
    ready: Mutex<HashSet<String>>,
    missing: Mutex<HashSet<String>>,
}

impl MockRuntimeResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register `runtime`, not yet ready.
    pub(crate) fn install(&self, runtime: MockRuntime) {
        self.runtimes
            .lock()
            .insert(runtime.package.clone(), Arc::new(runtime));
    }

    pub(crate) fn set_ready(&self, package: &str, ready: bool) {
        if ready {
            self.ready.lock().insert(package.to_string());
        } else {
            self.ready.lock().remove(package);
        }
    }

    pub(crate) fn mark_missing(&self, package: &str) {
        self.missing.lock().insert(package.to_string());
    }
}

impl RuntimeResolver for MockRuntimeResolver {
    fn resolve_runtime(&self, package: &str) -> Option<Arc<dyn PluginRuntime>> {
        if !self.is_runtime_ready(package) {
            return None;
        }
        self.runtimes.lock().get(package).cloned()
    }

    fn is_runtime_ready(&self, package: &str) -> bool {
        self.ready.lock().contains(package)
    }

    fn is_installed(&self, package: &str) -> bool {
        !self.missing.lock().contains(package)
    }
}

pub(crate) struct Connectivity(pub(crate) AtomicBool);

impl Connectivity {
    pub(crate) fn new(connected: bool) -> Self {
        Self(AtomicBool::new(connected))
    }

    pub(crate) fn set(&self, connected: bool) {
        self.0.store(connected, Ordering::SeqCst);
    }
}

impl ServiceConnectivity for Connectivity {
    fn is_connected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub(crate) struct RecordingCallback {
    pub(crate) results: Mutex<Vec<(String, bool)>>,
}

impl RecoveryCallback for RecordingCallback {
    fn on_recovery_finished(&self, package: &str, success: bool) {
        self.results.lock().push((package.to_string(), success));
    }
}
