use std::sync::Arc;
use std::sync::atomic::Ordering;

use pluginhost_config::HostConfig;
use pluginhost_protocols::actions::{action, extra};
use pluginhost_protocols::{Broadcast, ErrorCode, Intent, IntentFlags, LaunchMode};

use super::*;
use crate::launch::LaunchOutcome;
use crate::recovery::{Interception, NavigationState};
use crate::service::redirected_target;
use crate::testing::{
    Connectivity, MapResolver, MockHandle, MockRuntime, MockRuntimeResolver, MockServiceHost,
    RecordingLauncher, RecordingSink, ServiceScript, component,
};

const PLUGIN: &str = "com.example.plugin";
const HOST: &str = "com.pluginhost.host";

struct Fixture {
    runtimes: Arc<MockRuntimeResolver>,
    launcher: Arc<RecordingLauncher>,
    sink: Arc<RecordingSink>,
    connectivity: Arc<Connectivity>,
    host: PluginHost,
}

impl Fixture {
    fn new() -> Self {
        let runtimes = Arc::new(MockRuntimeResolver::new());
        runtimes.install(
            MockRuntime::new(PLUGIN)
                .with_activity("A", LaunchMode::Standard, None)
                .with_activity("B", LaunchMode::Standard, None)
                .with_activity("C", LaunchMode::Standard, None)
                .with_activity("D", LaunchMode::Standard, None)
                .with_activity("Home", LaunchMode::SingleTask, None)
                .with_activity("Top", LaunchMode::SingleTop, None)
                .with_resolver(Arc::new(
                    MapResolver::new("plugin")
                        .with_service("com.example.plugin.Sync", ServiceScript::default().constructor()),
                )),
        );
        let launcher = Arc::new(RecordingLauncher::default());
        let sink = Arc::new(RecordingSink::default());
        let connectivity = Arc::new(Connectivity::new(true));
        let host = PluginHost::new(
            HostConfig::default(),
            HostCollaborators {
                runtimes: runtimes.clone(),
                launcher: launcher.clone(),
                errors: sink.clone(),
                connectivity: connectivity.clone(),
            },
        );
        Self {
            runtimes,
            launcher,
            sink,
            connectivity,
            host,
        }
    }

    fn ready() -> Self {
        let fx = Self::new();
        fx.runtimes.set_ready(PLUGIN, true);
        fx
    }

    fn intent(class: &str) -> Intent {
        Intent::new(component(PLUGIN, class))
    }

    /// Start `class` and play the OS: create a record when the launch asks
    /// for a new instance.
    fn open(&self, class: &str, flags: IntentFlags) -> (LaunchDecision, Option<Arc<MockHandle>>) {
        let outcome = self
            .host
            .start_activity(Self::intent(class).with_flags(flags))
            .unwrap();
        let StartOutcome::Launched { decision, intent } = outcome else {
            panic!("expected a launch");
        };
        if !decision.creates_instance() {
            return (decision, None);
        }
        let handle = Arc::new(MockHandle::new());
        self.host
            .on_activity_created(component(PLUGIN, class), handle.clone(), Some(intent));
        (decision, Some(handle))
    }

    fn focused(&self) -> Vec<String> {
        self.host.dump_stacks().plugins[PLUGIN].tasks[PLUGIN]
            .iter()
            .map(|entry| entry.rsplit('.').next().unwrap_or_default().to_string())
            .collect()
    }

    fn launched_targets(&self) -> Vec<String> {
        self.launcher
            .launched
            .lock()
            .iter()
            .filter_map(redirected_target)
            .map(|(target, _)| target.short_class().to_string())
            .collect()
    }
}

#[test]
fn test_launch_redirects_to_activity_proxy() {
    let fx = Fixture::ready();
    let outcome = fx.host.start_activity(Fixture::intent("A")).unwrap();

    let StartOutcome::Launched { decision, intent } = outcome else {
        panic!("expected a launch");
    };
    assert!(matches!(decision.outcome, LaunchOutcome::NewInstance));
    assert_eq!(
        intent.component,
        Some(pluginhost_protocols::ComponentName::new(HOST, "com.pluginhost.host.ActivityProxy"))
    );
    let (target, process) = redirected_target(&intent).unwrap();
    assert_eq!(target, component(PLUGIN, "A"));
    assert_eq!(process, HOST);
    assert_eq!(fx.launcher.count(), 1);
}

#[test]
fn test_not_ready_parks_and_requests_start() {
    let fx = Fixture::new();
    let mut observer = fx.host.bus().subscribe();

    let outcome = fx.host.start_activity(Fixture::intent("A")).unwrap();
    assert!(matches!(outcome, StartOutcome::Parked(_)));
    assert_eq!(fx.host.pending().cached_len(PLUGIN), 1);
    assert_eq!(fx.launcher.count(), 0);

    let sent = observer.try_recv().unwrap();
    assert_eq!(sent.action, action::START_PLUGIN);
    assert_eq!(sent.string_extra(extra::TARGET_PACKAGE), Some(PLUGIN));
}

#[test]
fn test_loaded_plugin_drains_cache_in_order() {
    let fx = Fixture::new();
    fx.host.start_activity(Fixture::intent("A")).unwrap();
    fx.host.start_activity(Fixture::intent("B")).unwrap();

    fx.runtimes.set_ready(PLUGIN, true);
    assert_eq!(fx.host.on_plugin_loaded(PLUGIN), 2);
    assert_eq!(fx.launched_targets(), vec![".A", ".B"]);
    assert_eq!(fx.host.pending().cached_len(PLUGIN), 0);
    assert_eq!(fx.host.pending().loading_len(), 2);
    assert_eq!(fx.sink.codes(), vec![ErrorCode::Success]);

    fx.host
        .on_activity_created(component(PLUGIN, "A"), Arc::new(MockHandle::new()), None);
    assert_eq!(fx.host.pending().loading_len(), 1);
}

#[test]
fn test_single_task_matches_request_still_loading() {
    let fx = Fixture::new();
    fx.host.start_activity(Fixture::intent("Home")).unwrap();
    fx.host.start_activity(Fixture::intent("Home")).unwrap();

    fx.runtimes.set_ready(PLUGIN, true);
    fx.host.on_plugin_loaded(PLUGIN);

    let launched = fx.launcher.launched.lock().clone();
    assert_eq!(launched.len(), 2);
    assert!(!launched[0].has_flags(IntentFlags::CLEAR_TOP));
    assert!(launched[1].has_flags(IntentFlags::CLEAR_TOP | IntentFlags::SINGLE_TOP));
}

#[test]
fn test_load_failure_drops_pending_and_broadcasts() {
    let fx = Fixture::new();
    let mut observer = fx.host.bus().subscribe();
    fx.host.start_activity(Fixture::intent("A")).unwrap();
    let _ = observer.try_recv();

    assert_eq!(fx.host.on_plugin_load_failed(PLUGIN, "dex corrupted"), 1);
    assert!(fx.host.pending().is_empty());
    assert_eq!(fx.sink.codes(), vec![ErrorCode::RuntimeNotReady]);

    let sent = observer.try_recv().unwrap();
    assert_eq!(sent.action, action::START_PLUGIN_ERROR);
    assert_eq!(sent.string_extra(extra::ERROR_MESSAGE), Some("dex corrupted"));
}

#[test]
fn test_not_installed_is_reported() {
    let fx = Fixture::new();
    fx.runtimes.mark_missing(PLUGIN);

    let err = fx.host.start_activity(Fixture::intent("A")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotInstalled);
    assert_eq!(fx.sink.codes(), vec![ErrorCode::NotInstalled]);
}

#[test]
fn test_undeclared_activity_is_reported() {
    let fx = Fixture::ready();
    let err = fx.host.start_activity(Fixture::intent("Nope")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ComponentNotFound);
    assert_eq!(fx.launcher.count(), 0);
}

#[test]
fn test_intent_without_component_is_invalid() {
    let fx = Fixture::ready();
    let err = fx
        .host
        .start_activity(Intent::with_action("pluginhost.action.VIEW"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidIntent);
}

#[test]
fn test_end_to_end_stack_scenario() {
    let fx = Fixture::ready();
    fx.open("A", IntentFlags::NONE);
    fx.open("B", IntentFlags::NONE);
    let (_, c) = fx.open("C", IntentFlags::NONE);
    assert_eq!(fx.focused(), vec!["A", "B", "C"]);

    let (_, d) = fx.open("D", IntentFlags::NONE);
    assert_eq!(fx.focused(), vec!["A", "B", "C", "D"]);

    let (decision, _) = fx.open("B", IntentFlags::CLEAR_TOP);
    assert_eq!(decision.finished.len(), 2);
    assert_eq!(c.unwrap().finish_calls(), 1);
    assert_eq!(d.unwrap().finish_calls(), 1);
    assert_eq!(fx.focused(), vec!["A", "B"]);

    let (decision, handle) = fx.open("B", IntentFlags::SINGLE_TOP);
    assert!(decision.reused().is_some());
    assert!(handle.is_none());
    assert_eq!(fx.focused(), vec!["A", "B"]);
    assert_eq!(fx.host.dump_stacks().physical[HOST].len(), 2);
}

#[test]
fn test_single_top_activity_is_not_duplicated() {
    let fx = Fixture::ready();
    fx.open("A", IntentFlags::NONE);
    fx.open("Top", IntentFlags::NONE);
    let (decision, handle) = fx.open("Top", IntentFlags::NONE);

    assert!(handle.is_none());
    assert!(fx.launcher.launched.lock()[2].has_flags(IntentFlags::SINGLE_TOP));
    assert!(decision.reused().unwrap().intent().is_some());
    assert_eq!(fx.focused(), vec!["A", "Top"]);
}

#[test]
fn test_destroyed_activity_leaves_both_views() {
    let fx = Fixture::ready();
    fx.open("A", IntentFlags::NONE);
    let record = fx
        .host
        .on_activity_created(component(PLUGIN, "B"), Arc::new(MockHandle::new()), None);

    assert!(fx.host.on_activity_destroyed(record.id()));
    assert_eq!(fx.focused(), vec!["A"]);
    assert_eq!(fx.host.dump_stacks().physical[HOST].len(), 1);
    assert!(!fx.host.on_activity_destroyed(record.id()));
}

#[test]
fn test_unload_finishes_everything() {
    let fx = Fixture::ready();
    let (_, a) = fx.open("A", IntentFlags::NONE);
    let (_, b) = fx.open("B", IntentFlags::NONE);

    assert_eq!(fx.host.unload_plugin(PLUGIN), 2);
    assert_eq!(a.unwrap().finish_calls(), 1);
    assert_eq!(b.unwrap().finish_calls(), 1);
    assert!(fx.host.plugin_stacks(PLUGIN).is_none());
    assert!(fx.host.dump_stacks().physical[HOST].is_empty());
    assert_eq!(fx.host.unload_plugin(PLUGIN), 0);
}

#[test]
fn test_quit_service_broadcast_reaches_services() {
    let fx = Fixture::ready();
    let proxy = Arc::new(MockServiceHost::new("ServiceProxy0"));
    fx.host
        .services()
        .load_or_create(PLUGIN, "com.example.plugin.Sync", proxy.clone(), PLUGIN)
        .unwrap();

    fx.host.send_broadcast(
        &Broadcast::new(action::QUIT_SERVICE).with_extra(extra::KILL_PROCESS, true),
    );
    assert!(fx.host.services().is_empty());
    assert_eq!(proxy.stop_count(), 1);
    assert!(proxy.killed.load(Ordering::SeqCst));
}

#[test]
fn test_shutdown_is_idempotent_and_final() {
    let fx = Fixture::ready();
    let (_, a) = fx.open("A", IntentFlags::NONE);

    fx.host.shutdown();
    fx.host.shutdown();
    assert_eq!(fx.host.state(), HostState::Stopped);
    assert_eq!(a.unwrap().finish_calls(), 1);
    assert!(fx.host.start_activity(Fixture::intent("A")).is_err());
}

#[test]
fn test_dump_serializes() {
    let fx = Fixture::ready();
    fx.open("A", IntentFlags::NONE);

    let json = serde_json::to_value(fx.host.dump_stacks()).unwrap();
    assert_eq!(json["plugins"][PLUGIN]["focused"], PLUGIN);
    assert_eq!(json["physical"][HOST][0], "com.example.plugin/.A");
}

#[test]
fn test_recovery_waits_for_runtime() {
    let fx = Fixture::new();
    fx.connectivity.set(false);
    let placeholder = Arc::new(MockHandle::new());
    let recreated = crate::service::redirect_intent(
        &pluginhost_protocols::ComponentName::new(HOST, "com.pluginhost.host.ActivityProxy"),
        &component(PLUGIN, "A"),
        HOST,
        &Fixture::intent("A"),
    );

    let parked = fx
        .host
        .recovery()
        .intercept_create(&recreated, None, placeholder.clone());
    let Interception::Parked { navigation, .. } = parked else {
        panic!("expected the recreation to be parked");
    };

    fx.connectivity.set(true);
    fx.host.on_service_connected();
    assert_eq!(fx.launcher.count(), 0);

    fx.runtimes.set_ready(PLUGIN, true);
    fx.host.on_plugin_loaded(PLUGIN);
    assert_eq!(fx.launcher.count(), 1);
    assert_eq!(placeholder.finish_calls(), 1);
    assert_eq!(
        fx.host.recovery().navigation_state(navigation),
        Some(NavigationState::Finished)
    );
}
