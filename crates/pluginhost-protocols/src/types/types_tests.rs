use super::*;

fn main_activity() -> ComponentName {
    ComponentName::new("com.example.plugin", "com.example.plugin.MainActivity")
}

#[test]
fn test_component_display_uses_short_class() {
    assert_eq!(main_activity().to_string(), "com.example.plugin/.MainActivity");

    let foreign = ComponentName::new("com.example.plugin", "org.other.Widget");
    assert_eq!(foreign.to_string(), "com.example.plugin/org.other.Widget");
}

#[test]
fn test_task_name_defaults_to_package() {
    let info = ActivityInfo::new(main_activity(), LaunchMode::Standard);
    assert_eq!(info.task_name(), "com.example.plugin");

    let empty = ActivityInfo::new(main_activity(), LaunchMode::Standard).with_task_affinity("");
    assert_eq!(empty.task_name(), "com.example.plugin");

    let explicit = ActivityInfo::new(main_activity(), LaunchMode::SingleTask)
        .with_task_affinity("com.example.plugin.detail");
    assert_eq!(explicit.task_name(), "com.example.plugin.detail");
}

#[test]
fn test_flags_toggle_and_contains() {
    let mut flags = IntentFlags::SINGLE_TOP | IntentFlags::CLEAR_TOP;
    assert!(flags.contains(IntentFlags::SINGLE_TOP));
    assert!(flags.contains(IntentFlags::CLEAR_TOP));

    flags.toggle(IntentFlags::SINGLE_TOP);
    assert!(!flags.contains(IntentFlags::SINGLE_TOP));
    assert!(flags.contains(IntentFlags::CLEAR_TOP));

    flags.remove(IntentFlags::CLEAR_TOP);
    assert!(flags.is_empty());
}

#[test]
fn test_intent_extras() {
    let mut intent = Intent::new(main_activity()).with_extra("k", "v");
    assert_eq!(intent.string_extra("k"), Some("v"));
    assert!(!intent.bool_extra("missing"));

    intent.put_extra("flag", true);
    assert!(intent.bool_extra("flag"));
    assert!(intent.remove_extra("k").is_some());
    assert!(intent.string_extra("k").is_none());
    assert_eq!(intent.target_package(), Some("com.example.plugin"));
    assert!(intent.targets(&main_activity()));
}

#[test]
fn test_intent_serde_keeps_flags_as_bits() {
    let intent = Intent::new(main_activity()).with_flags(IntentFlags::CLEAR_TOP);
    let json = serde_json::to_value(&intent).unwrap();
    assert_eq!(json["flags"], serde_json::json!(IntentFlags::CLEAR_TOP.bits()));

    let back: Intent = serde_json::from_value(json).unwrap();
    assert_eq!(back, intent);
}

#[test]
fn test_launch_mode_serde_names() {
    let mode: LaunchMode = serde_json::from_str("\"single_task\"").unwrap();
    assert_eq!(mode, LaunchMode::SingleTask);
    assert_eq!(LaunchMode::default(), LaunchMode::Standard);
}

#[test]
fn test_broadcast_extras() {
    let broadcast = Broadcast::new("a").with_extra("pkg", "p").with_extra("kill", true);
    assert_eq!(broadcast.string_extra("pkg"), Some("p"));
    assert!(broadcast.bool_extra("kill"));
    assert!(!broadcast.bool_extra("pkg"));
}
