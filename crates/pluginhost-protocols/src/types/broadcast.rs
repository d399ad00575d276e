//! Broadcast messages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A process-local broadcast: an action name plus extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub action: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
}

impl Broadcast {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            extras: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub fn string_extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).and_then(Value::as_str)
    }

    pub fn bool_extra(&self, key: &str) -> bool {
        self.extras.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}
