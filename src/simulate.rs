//! `pluginhost simulate`: replay a scenario against an in-memory host.
//!
//! The binary plays every collaborator the host needs: plugin runtimes
//! come from the scenario's manifests, and a scripted platform records
//! launched intents and creates the proxy activities for them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use pluginhost_config::{ConfigValidator, HostConfig};
use pluginhost_core::{
    HostCollaborators, Interception, PluginHost, StackDump, StartOutcome, TracingErrorSink,
    redirect_intent, redirected_target,
};
use pluginhost_protocols::actions::{action, extra};
use pluginhost_protocols::{
    ActivityInfo, AttachContext, Broadcast, ClassResolver, ComponentHandle, ComponentName,
    ErrorCode, ErrorSink, Intent, IntentFlags, Launcher, PluginError, PluginRuntime, PluginService,
    Resolution, RuntimeResolver, SavedState, ServiceConnectivity, ServiceConstructor, ServiceHost,
    StartResult,
};

use crate::cli::OutputFormat;
use crate::scenario::{FlagSpec, PluginSpec, Scenario, Step, class_name, component};

/// Upper bound on launch/create rounds after one step.
const MAX_SETTLE_ROUNDS: usize = 64;

// ============================================================================
// Plugin side
// ============================================================================

struct Manifest {
    package: String,
    activities: HashMap<String, ActivityInfo>,
    services: Vec<String>,
}

impl Manifest {
    fn from_spec(spec: &PluginSpec) -> Self {
        let activities = spec
            .activities
            .iter()
            .map(|activity| {
                let info = activity.info(&spec.package);
                (info.component.class.clone(), info)
            })
            .collect();
        let services = spec
            .services
            .iter()
            .map(|name| class_name(&spec.package, name))
            .collect();
        Self {
            package: spec.package.clone(),
            activities,
            services,
        }
    }
}

impl ClassResolver for Manifest {
    fn namespace(&self) -> &str {
        &self.package
    }

    fn resolve_service(&self, class: &str) -> Resolution<ServiceConstructor> {
        if !self.services.iter().any(|s| s == class) {
            return Resolution::NotFound;
        }
        let ctor: ServiceConstructor = Arc::new(|ctx: &AttachContext| {
            Ok::<_, PluginError>(Box::new(ScriptedService {
                component: ctx.component.clone(),
                proxy: ctx.proxy.clone(),
            }) as Box<dyn PluginService>)
        });
        Resolution::Found(ctor)
    }
}

/// Plugin service that only logs its callbacks.
struct ScriptedService {
    component: ComponentName,
    proxy: ComponentName,
}

impl PluginService for ScriptedService {
    fn on_create(&mut self) -> Result<(), PluginError> {
        info!(service = %self.component, proxy = %self.proxy, "service created");
        Ok(())
    }

    fn on_start_command(&mut self, _intent: &Intent, start_id: u32) -> Result<StartResult, PluginError> {
        info!(service = %self.component, start_id, "service started");
        Ok(StartResult::Sticky)
    }

    fn on_destroy(&mut self) {
        info!(service = %self.component, "service destroyed");
    }
}

struct ScriptedRuntime(Arc<Manifest>);

impl PluginRuntime for ScriptedRuntime {
    fn package(&self) -> &str {
        &self.0.package
    }

    fn activity_info(&self, class: &str) -> Option<ActivityInfo> {
        self.0.activities.get(class).cloned()
    }

    fn class_resolvers(&self) -> Vec<Arc<dyn ClassResolver>> {
        vec![self.0.clone()]
    }
}

struct ScriptedRuntimes {
    manifests: HashMap<String, Arc<Manifest>>,
    ready: Mutex<Vec<String>>,
}

impl ScriptedRuntimes {
    fn new(plugins: &[PluginSpec]) -> Self {
        Self {
            manifests: plugins
                .iter()
                .map(|spec| (spec.package.clone(), Arc::new(Manifest::from_spec(spec))))
                .collect(),
            ready: Mutex::new(
                plugins
                    .iter()
                    .filter(|spec| spec.loaded)
                    .map(|spec| spec.package.clone())
                    .collect(),
            ),
        }
    }

    fn load(&self, package: &str) -> bool {
        if !self.manifests.contains_key(package) {
            return false;
        }
        let mut ready = self.ready.lock();
        if !ready.iter().any(|p| p == package) {
            ready.push(package.to_string());
        }
        true
    }

    fn unload(&self, package: &str) {
        self.ready.lock().retain(|p| p != package);
    }

    fn unload_all(&self) {
        self.ready.lock().clear();
    }
}

impl RuntimeResolver for ScriptedRuntimes {
    fn resolve_runtime(&self, package: &str) -> Option<Arc<dyn PluginRuntime>> {
        if !self.is_runtime_ready(package) {
            return None;
        }
        let manifest = self.manifests.get(package)?.clone();
        Some(Arc::new(ScriptedRuntime(manifest)))
    }

    fn is_runtime_ready(&self, package: &str) -> bool {
        self.ready.lock().iter().any(|p| p == package)
    }

    fn is_installed(&self, package: &str) -> bool {
        self.manifests.contains_key(package)
    }
}

// ============================================================================
// Platform side
// ============================================================================

/// Records launches, reports connectivity and forwards errors to the log.
#[derive(Default)]
struct ScriptedPlatform {
    launched: Mutex<Vec<Intent>>,
    connected: AtomicBool,
    failures: Mutex<Vec<(String, ErrorCode)>>,
    sink: TracingErrorSink,
}

impl ScriptedPlatform {
    fn take_launched(&self) -> Vec<Intent> {
        std::mem::take(&mut *self.launched.lock())
    }

    fn take_failures(&self) -> Vec<(String, ErrorCode)> {
        std::mem::take(&mut *self.failures.lock())
    }
}

impl Launcher for ScriptedPlatform {
    fn launch(&self, intent: Intent) {
        self.launched.lock().push(intent);
    }
}

impl ServiceConnectivity for ScriptedPlatform {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl ErrorSink for ScriptedPlatform {
    fn deliver(&self, success: bool, package: &str, code: ErrorCode, message: &str) {
        self.sink.deliver(success, package, code, message);
        if !success {
            self.failures.lock().push((package.to_string(), code));
        }
    }
}

/// A proxy activity instance created by the platform.
#[derive(Default)]
struct ScriptedActivity {
    finishing: AtomicBool,
}

impl ComponentHandle for ScriptedActivity {
    fn finish(&self) {
        self.finishing.store(true, Ordering::SeqCst);
    }

    fn is_finishing(&self) -> bool {
        self.finishing.load(Ordering::SeqCst)
    }
}

/// A running proxy service slot.
struct ScriptedProxy {
    component: ComponentName,
}

impl ServiceHost for ScriptedProxy {
    fn component(&self) -> &ComponentName {
        &self.component
    }

    fn stop_self(&self) {
        info!(proxy = %self.component, "proxy service stopped");
    }

    fn kill_process(&self) {
        info!(proxy = %self.component, "proxy process killed");
    }
}

// ============================================================================
// Replay
// ============================================================================

/// What one step did.
#[derive(Debug, Serialize)]
struct StepReport {
    index: usize,
    op: &'static str,
    result: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dump: Option<StackDump>,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    scenario: Option<String>,
    steps: Vec<StepReport>,
    final_stacks: StackDump,
}

struct Simulation {
    config: HostConfig,
    runtimes: Arc<ScriptedRuntimes>,
    platform: Arc<ScriptedPlatform>,
    host: PluginHost,
    proxies: HashMap<ComponentName, Arc<ScriptedProxy>>,
    placeholders: Vec<Arc<ScriptedActivity>>,
    next_start_id: u32,
}

impl Simulation {
    fn new(config: HostConfig, scenario: &Scenario) -> Self {
        let runtimes = Arc::new(ScriptedRuntimes::new(&scenario.plugins));
        let platform = Arc::new(ScriptedPlatform::default());
        platform.connected.store(scenario.connected, Ordering::SeqCst);
        let host = Self::build_host(&config, &runtimes, &platform);
        Self {
            config,
            runtimes,
            platform,
            host,
            proxies: HashMap::new(),
            placeholders: Vec::new(),
            next_start_id: 1,
        }
    }

    fn build_host(
        config: &HostConfig,
        runtimes: &Arc<ScriptedRuntimes>,
        platform: &Arc<ScriptedPlatform>,
    ) -> PluginHost {
        let host = PluginHost::new(
            config.clone(),
            HostCollaborators {
                runtimes: runtimes.clone(),
                launcher: platform.clone(),
                errors: platform.clone(),
                connectivity: platform.clone(),
            },
        );
        tokio::spawn(observe(host.bus().subscribe()));
        host
    }

    fn run_step(&mut self, step: &Step) -> String {
        let result = match step {
            Step::Launch {
                package,
                activity,
                flags,
            } => self.launch(package, activity, FlagSpec::bits(flags)),
            Step::Back { package } => self.back(package),
            Step::Load { package } => {
                if self.runtimes.load(package) {
                    let dispatched = self.host.on_plugin_loaded(package);
                    format!("loaded, {} cached request(s) dispatched", dispatched)
                } else {
                    format!("{} is not installed", package)
                }
            }
            Step::LoadFailed { package, message } => {
                self.runtimes.unload(package);
                let dropped = self.host.on_plugin_load_failed(package, message);
                format!("load failed, {} cached request(s) dropped", dropped)
            }
            Step::Connect => {
                self.platform.connected.store(true, Ordering::SeqCst);
                let receivers = self.host.on_service_connected();
                format!("connected, {} receiver(s) notified", receivers)
            }
            Step::Disconnect => {
                self.platform.connected.store(false, Ordering::SeqCst);
                "disconnected".to_string()
            }
            Step::Restart => self.restart(),
            Step::StartService { package, service } => self.start_service(package, service),
            Step::StopService { package, service } => {
                let class = class_name(package, service);
                if self.host.services().stop(package, &class) {
                    "stopped".to_string()
                } else {
                    "not running".to_string()
                }
            }
            Step::BindService { package, service } => self.bind_service(package, service),
            Step::UnbindService { package, service } => {
                let target = component(package, service);
                match self
                    .host
                    .services()
                    .unbind(package, &target.class, &Intent::new(target.clone()))
                {
                    Some(count) => format!("unbound, {} binding(s) left", count),
                    None => "not bound".to_string(),
                }
            }
            Step::Quit { kill } => {
                let broadcast =
                    Broadcast::new(action::QUIT_SERVICE).with_extra(extra::KILL_PROCESS, *kill);
                let delivered = self.host.send_broadcast(&broadcast);
                format!("quit delivered to {} receiver(s)", delivered)
            }
            Step::Unload { package } => {
                self.runtimes.unload(package);
                let finished = self.host.unload_plugin(package);
                format!("unloaded, {} activity(ies) finished", finished)
            }
            Step::Dump => "dump".to_string(),
        };
        self.settle();
        result
    }

    fn launch(&mut self, package: &str, activity: &str, flags: IntentFlags) -> String {
        let intent = Intent::new(component(package, activity)).with_flags(flags);
        match self.host.start_activity(intent) {
            Ok(StartOutcome::Parked(id)) => format!("parked ({})", id),
            Ok(StartOutcome::Launched { decision, .. }) => {
                let mut result = decision.outcome.name().to_string();
                if !decision.finished.is_empty() {
                    result.push_str(&format!(", finished {}", decision.finished.len()));
                }
                if decision.merged_background {
                    result.push_str(", merged background task");
                }
                if let Some(task) = &decision.switched_task {
                    result.push_str(&format!(", switched to {}", task));
                }
                result
            }
            Err(e) => format!("refused: {}", e),
        }
    }

    fn back(&mut self, package: &str) -> String {
        let top = self
            .host
            .plugin_stacks(package)
            .and_then(|stacks| stacks.focused().top());
        match top {
            Some(record) => {
                record.finish();
                format!("finished {}", record.component())
            }
            None => "nothing to finish".to_string(),
        }
    }

    fn proxy_for(&mut self, process: &str) -> Option<Arc<ScriptedProxy>> {
        let slot = self.host.proxies().proxy_for(process)?;
        let proxy = self
            .proxies
            .entry(slot.clone())
            .or_insert_with(|| Arc::new(ScriptedProxy { component: slot }));
        Some(proxy.clone())
    }

    fn start_service(&mut self, package: &str, service: &str) -> String {
        let target = component(package, service);
        let process = self.config.host.process.clone();
        let Some(proxy) = self.proxy_for(&process) else {
            return "no proxy service configured".to_string();
        };
        let start_id = self.next_start_id;
        self.next_start_id += 1;

        let services = self.host.services();
        let started = services
            .load_or_create(package, &target.class, proxy, &process)
            .and_then(|_| services.start(package, &target.class, &Intent::new(target.clone()), start_id));
        match started {
            Ok(result) => format!("started (id {}, {:?})", start_id, result),
            Err(e) => format!("refused: {}", e),
        }
    }

    fn bind_service(&mut self, package: &str, service: &str) -> String {
        let target = component(package, service);
        let process = self.config.host.process.clone();
        let Some(proxy) = self.proxy_for(&process) else {
            return "no proxy service configured".to_string();
        };

        let services = self.host.services();
        let bound = services
            .load_or_create(package, &target.class, proxy, &process)
            .and_then(|_| services.bind(package, &target.class, &Intent::new(target.clone())));
        match bound {
            Ok(count) => format!("bound, {} binding(s)", count),
            Err(e) => format!("refused: {}", e),
        }
    }

    /// The process dies. The platform recreates every live proxy activity
    /// top first, in a fresh host whose plugins are not loaded yet.
    fn restart(&mut self) -> String {
        let proxy_activity =
            ComponentName::new(self.config.host.package.clone(), self.config.proxy.activity.clone());
        let mut recreated = Vec::new();
        for stack in self.host.global_stacks().stacks() {
            for record in stack.records() {
                if record.is_finishing() {
                    continue;
                }
                let target = record.component().clone();
                let intent = record.intent().unwrap_or_else(|| {
                    redirect_intent(
                        &proxy_activity,
                        &target,
                        &self.config.host.process,
                        &Intent::new(target.clone()),
                    )
                });
                recreated.push((target, intent));
            }
        }

        self.runtimes.unload_all();
        self.platform.connected.store(false, Ordering::SeqCst);
        self.platform.take_launched();
        self.proxies.clear();
        self.placeholders.clear();
        self.host = Self::build_host(&self.config, &self.runtimes, &self.platform);

        let mut parked = 0;
        for (target, intent) in recreated {
            let icicle = SavedState::new(format!("state:{}", target.short_class()).into_bytes());
            let shell = Arc::new(ScriptedActivity::default());
            match self.host.recovery().intercept_create(&intent, Some(icicle), shell.clone()) {
                Interception::Parked { .. } => {
                    parked += 1;
                    self.placeholders.push(shell);
                }
                Interception::Proceed => {
                    self.host.on_activity_created(target, shell, Some(intent));
                }
            }
        }
        format!("restarted, {} activity(ies) waiting for recovery", parked)
    }

    /// Destroy finished activities and create launched ones until the
    /// platform is idle.
    fn settle(&mut self) {
        for _ in 0..MAX_SETTLE_ROUNDS {
            self.reap_finished();
            let launched = self.platform.take_launched();
            if launched.is_empty() {
                self.placeholders.retain(|p| !p.is_finishing());
                return;
            }
            for intent in launched {
                self.deliver(intent);
            }
        }
        warn!(rounds = MAX_SETTLE_ROUNDS, "launch queue did not settle");
    }

    fn reap_finished(&self) {
        for stack in self.host.global_stacks().stacks() {
            for record in stack.records() {
                if record.is_finishing() {
                    self.host.on_activity_destroyed(record.id());
                }
            }
        }
    }

    /// Play the platform for one launched proxy intent.
    fn deliver(&mut self, mut intent: Intent) {
        let Some((target, _)) = redirected_target(&intent) else {
            warn!(?intent, "launched intent does not target a plugin component");
            return;
        };

        // A flagged launch whose target already tops the focused task is a
        // new-intent delivery, not a new instance.
        if intent.has_flags(IntentFlags::SINGLE_TOP) || intent.has_flags(IntentFlags::CLEAR_TOP) {
            let top = self
                .host
                .plugin_stacks(&target.package)
                .and_then(|stacks| stacks.focused().top())
                .filter(|record| !record.is_finishing() && record.fronts(&target));
            if let Some(record) = top {
                debug!(component = %target, "new intent delivered");
                record.set_intent(intent);
                return;
            }
        }

        let shell = Arc::new(ScriptedActivity::default());
        match self.host.recovery().intercept_create(&intent, None, shell.clone()) {
            Interception::Parked { navigation, .. } => {
                debug!(component = %target, %navigation, "creation parked");
                self.placeholders.push(shell);
            }
            Interception::Proceed => {
                if let Some(state) = self.host.recovery().consume_icicle(&mut intent) {
                    debug!(component = %target, bytes = state.len(), "state restored");
                }
                self.host.on_activity_created(target, shell, Some(intent));
            }
        }
    }
}

/// Log every broadcast seen on the host bus.
async fn observe(mut rx: tokio::sync::broadcast::Receiver<Broadcast>) {
    loop {
        match rx.recv().await {
            Ok(broadcast) => debug!(action = %broadcast.action, "broadcast observed"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "broadcast observer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn render_dump(dump: &StackDump) -> String {
    let mut out = String::new();
    out.push_str("  physical:\n");
    for (name, records) in &dump.physical {
        out.push_str(&format!("    {} [{}]\n", name, records.join(", ")));
    }
    for (package, plugin) in &dump.plugins {
        out.push_str(&format!(
            "  plugin {} (focused {}, last {})\n",
            package,
            plugin.focused,
            plugin.last_focused.as_deref().unwrap_or("-")
        ));
        for (task, records) in &plugin.tasks {
            out.push_str(&format!("    {} [{}]\n", task, records.join(", ")));
        }
    }
    out.push_str(&format!("  pending {}, loading {}\n", dump.pending, dump.loading));
    for service in &dump.services {
        out.push_str(&format!(
            "  service {} via {} [{}] {:?} bound {}\n",
            service.component,
            service.proxy,
            service.processes.join(", "),
            service.state,
            service.bind_count
        ));
    }
    out
}

fn replay(config: HostConfig, scenario: &Scenario) -> SimulationReport {
    let mut simulation = Simulation::new(config, scenario);
    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let result = simulation.run_step(step);
        info!(step = index + 1, op = step.name(), %result, "step replayed");
        let errors = simulation
            .platform
            .take_failures()
            .into_iter()
            .map(|(package, code)| format!("{}: {}", package, code))
            .collect();
        steps.push(StepReport {
            index: index + 1,
            op: step.name(),
            result,
            errors,
            dump: matches!(step, Step::Dump).then(|| simulation.host.dump_stacks()),
        });
    }
    SimulationReport {
        scenario: scenario.name.clone(),
        steps,
        final_stacks: simulation.host.dump_stacks(),
    }
}

/// Replay `path` and print the result.
pub(crate) async fn run_simulation(
    config: HostConfig,
    path: &Path,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    for warning in ConfigValidator::validate(&config).into_result()? {
        warn!(path = %warning.path, "{}", warning.message);
    }
    let scenario = Scenario::load(path)?;
    info!(
        scenario = scenario.name.as_deref().unwrap_or("unnamed"),
        plugins = scenario.plugins.len(),
        steps = scenario.steps.len(),
        "replaying scenario"
    );

    let report = replay(config, &scenario);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            if let Some(name) = &report.scenario {
                println!("scenario: {}", name);
            }
            for step in &report.steps {
                println!("[{}] {}: {}", step.index, step.op, step.result);
                for error in &step.errors {
                    println!("  error {}", error);
                }
                if let Some(dump) = &step.dump {
                    print!("{}", render_dump(dump));
                }
            }
            println!("final:");
            print!("{}", render_dump(&report.final_stacks));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIL: &str = "com.example.mail";

    fn scenario(steps: &str) -> Scenario {
        let plugins = r#"
            [[plugins]]
            package = "com.example.mail"
            activities = [
                { name = "Inbox", launch_mode = "single_task" },
                { name = "Thread" },
                { name = "Compose", launch_mode = "single_top" },
            ]
            services = ["Sync"]
        "#;
        format!("{}\n{}", plugins, steps).parse().unwrap()
    }

    fn host_stack(report: &SimulationReport) -> Vec<String> {
        report
            .final_stacks
            .physical
            .get("com.pluginhost.host")
            .cloned()
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_cold_launch_then_load() {
        let scenario = scenario(
            r#"
            [[steps]]
            op = "launch"
            package = "com.example.mail"
            activity = "Inbox"

            [[steps]]
            op = "load"
            package = "com.example.mail"
            "#,
        );
        let report = replay(HostConfig::default(), &scenario);
        assert!(report.steps[0].result.starts_with("parked"));
        assert_eq!(report.steps[1].result, "loaded, 1 cached request(s) dispatched");
        assert_eq!(host_stack(&report), vec!["com.example.mail/.Inbox"]);
        assert_eq!(report.final_stacks.loading, 0);
    }

    #[tokio::test]
    async fn test_single_task_clears_above_and_back_pops() {
        let scenario = scenario(
            r#"
            [[steps]]
            op = "load"
            package = "com.example.mail"

            [[steps]]
            op = "launch"
            package = "com.example.mail"
            activity = "Inbox"

            [[steps]]
            op = "launch"
            package = "com.example.mail"
            activity = "Thread"

            [[steps]]
            op = "launch"
            package = "com.example.mail"
            activity = "Compose"

            [[steps]]
            op = "launch"
            package = "com.example.mail"
            activity = "Inbox"

            [[steps]]
            op = "launch"
            package = "com.example.mail"
            activity = "Thread"

            [[steps]]
            op = "back"
            package = "com.example.mail"
            "#,
        );
        let report = replay(HostConfig::default(), &scenario);
        assert_eq!(report.steps[4].result, "deliver_to_existing, finished 2");
        assert_eq!(report.steps[6].result, "finished com.example.mail/.Thread");
        assert_eq!(host_stack(&report), vec!["com.example.mail/.Inbox"]);
        assert_eq!(
            report.final_stacks.plugins[MAIL].tasks[MAIL],
            vec!["com.example.mail/.Inbox"]
        );
    }

    #[tokio::test]
    async fn test_single_top_reuses_top() {
        let scenario = scenario(
            r#"
            [[steps]]
            op = "load"
            package = "com.example.mail"

            [[steps]]
            op = "launch"
            package = "com.example.mail"
            activity = "Compose"

            [[steps]]
            op = "launch"
            package = "com.example.mail"
            activity = "Compose"
            "#,
        );
        let report = replay(HostConfig::default(), &scenario);
        assert_eq!(report.steps[2].result, "deliver_to_existing");
        assert_eq!(host_stack(&report), vec!["com.example.mail/.Compose"]);
    }

    #[tokio::test]
    async fn test_restart_rebuilds_after_recovery() {
        let scenario = scenario(
            r#"
            [[steps]]
            op = "load"
            package = "com.example.mail"

            [[steps]]
            op = "launch"
            package = "com.example.mail"
            activity = "Inbox"

            [[steps]]
            op = "launch"
            package = "com.example.mail"
            activity = "Thread"

            [[steps]]
            op = "restart"

            [[steps]]
            op = "load"
            package = "com.example.mail"

            [[steps]]
            op = "connect"
            "#,
        );
        let report = replay(HostConfig::default(), &scenario);
        assert_eq!(report.steps[3].result, "restarted, 2 activity(ies) waiting for recovery");
        assert_eq!(host_stack(&report), vec![
            "com.example.mail/.Inbox",
            "com.example.mail/.Thread",
        ]);
    }

    #[tokio::test]
    async fn test_load_failure_and_unknown_plugin_report_errors() {
        let scenario = scenario(
            r#"
            [[steps]]
            op = "launch"
            package = "com.example.mail"
            activity = "Inbox"

            [[steps]]
            op = "load_failed"
            package = "com.example.mail"
            message = "dex verification failed"

            [[steps]]
            op = "launch"
            package = "com.example.unknown"
            activity = "Main"
            "#,
        );
        let report = replay(HostConfig::default(), &scenario);
        assert_eq!(report.steps[1].result, "load failed, 1 cached request(s) dropped");
        assert!(!report.steps[1].errors.is_empty());
        assert!(report.steps[2].result.starts_with("refused"));
        assert!(report.final_stacks.physical.values().all(|records| records.is_empty()));
    }

    #[tokio::test]
    async fn test_services_through_proxy_pool() {
        let scenario = scenario(
            r#"
            [[steps]]
            op = "load"
            package = "com.example.mail"

            [[steps]]
            op = "bind_service"
            package = "com.example.mail"
            service = "Sync"

            [[steps]]
            op = "start_service"
            package = "com.example.mail"
            service = "Sync"

            [[steps]]
            op = "dump"

            [[steps]]
            op = "unbind_service"
            package = "com.example.mail"
            service = "Sync"

            [[steps]]
            op = "dump"
            "#,
        );
        let report = replay(HostConfig::default(), &scenario);
        assert_eq!(report.steps[1].result, "bound, 1 binding(s)");
        assert!(report.steps[2].result.starts_with("started (id 1"));
        let dump = report.steps[3].dump.as_ref().unwrap();
        assert_eq!(dump.services.len(), 1);
        assert_eq!(report.steps[4].result, "unbound, 0 binding(s) left");
        assert!(report.steps[5].dump.as_ref().unwrap().services.is_empty());
        assert!(report.final_stacks.services.is_empty());
    }

    #[test]
    fn test_render_dump_lists_every_section() {
        let mut dump = StackDump::default();
        dump.physical
            .insert("com.pluginhost.host".to_string(), vec!["a/.A".to_string()]);
        let text = render_dump(&dump);
        assert!(text.contains("com.pluginhost.host [a/.A]"));
        assert!(text.contains("pending 0, loading 0"));
    }
}
