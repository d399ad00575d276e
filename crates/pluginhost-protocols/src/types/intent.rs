//! Launch intents and their flags.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::{BitOr, BitOrAssign};

use super::ComponentName;

/// OS-level launch flags carried by an [`Intent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentFlags(u32);

impl IntentFlags {
    pub const NONE: IntentFlags = IntentFlags(0);
    pub const NEW_TASK: IntentFlags = IntentFlags(0x1000_0000);
    pub const SINGLE_TOP: IntentFlags = IntentFlags(0x2000_0000);
    pub const CLEAR_TOP: IntentFlags = IntentFlags(0x0400_0000);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: IntentFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: IntentFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: IntentFlags) {
        self.0 &= !other.0;
    }

    pub fn toggle(&mut self, other: IntentFlags) {
        self.0 ^= other.0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for IntentFlags {
    type Output = IntentFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        IntentFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for IntentFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A request to start a component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentName>,
    #[serde(default)]
    pub flags: IntentFlags,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
}

impl Intent {
    /// Explicit intent for `component`.
    pub fn new(component: ComponentName) -> Self {
        Self {
            component: Some(component),
            ..Default::default()
        }
    }

    /// Implicit intent carrying only an action (used for broadcasts).
    pub fn with_action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Default::default()
        }
    }

    pub fn with_flags(mut self, flags: IntentFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub fn add_flags(&mut self, flags: IntentFlags) {
        self.flags.insert(flags);
    }

    pub fn has_flags(&self, flags: IntentFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn put_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extras.insert(key.into(), value.into());
    }

    pub fn string_extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).and_then(Value::as_str)
    }

    pub fn bool_extra(&self, key: &str) -> bool {
        self.extras.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn remove_extra(&mut self, key: &str) -> Option<Value> {
        self.extras.remove(key)
    }

    /// Package this intent is addressed to, if explicit.
    pub fn target_package(&self) -> Option<&str> {
        self.component.as_ref().map(|c| c.package.as_str())
    }

    /// Whether this intent is addressed to `component`.
    pub fn targets(&self, component: &ComponentName) -> bool {
        self.component.as_ref() == Some(component)
    }
}

/// Opaque saved-state blob (icicle or restore bundle).
///
/// May contain plugin-defined types, so it is never decoded by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavedState(pub bytes::Bytes);

impl SavedState {
    pub fn new(data: impl Into<bytes::Bytes>) -> Self {
        Self(data.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
