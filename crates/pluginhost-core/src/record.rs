//! Running component records.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use pluginhost_protocols::{ComponentHandle, ComponentName, Intent};

/// One running plugin component instance.
///
/// Owns the shell's [`ComponentHandle`]; the shell never owns the record.
pub struct ComponentRecord {
    id: Uuid,
    component: ComponentName,
    handle: Arc<dyn ComponentHandle>,
    intent: Mutex<Option<Intent>>,
    created_at: DateTime<Utc>,
}

impl ComponentRecord {
    pub fn new(component: ComponentName, handle: Arc<dyn ComponentHandle>) -> Self {
        Self {
            id: Uuid::new_v4(),
            component,
            handle,
            intent: Mutex::new(None),
            created_at: Utc::now(),
        }
    }

    pub fn with_intent(self, intent: Intent) -> Self {
        *self.intent.lock() = Some(intent);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn component(&self) -> &ComponentName {
        &self.component
    }

    pub fn package(&self) -> &str {
        &self.component.package
    }

    pub fn handle(&self) -> &Arc<dyn ComponentHandle> {
        &self.handle
    }

    /// The intent that launched this instance (or was last redelivered to it).
    pub fn intent(&self) -> Option<Intent> {
        self.intent.lock().clone()
    }

    pub fn set_intent(&self, intent: Intent) {
        *self.intent.lock() = Some(intent);
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_finishing(&self) -> bool {
        self.handle.is_finishing()
    }

    /// Finish the shell unless it is already finishing.
    ///
    /// Returns whether a finish was issued.
    pub fn finish(&self) -> bool {
        if self.handle.is_finishing() {
            return false;
        }
        self.handle.finish();
        true
    }

    /// The plugin component this record currently fronts.
    ///
    /// Asks the shell first; shells that are the plugin class itself fall
    /// back to the recorded component.
    pub fn fronted_component(&self) -> ComponentName {
        self.handle
            .fronted_component()
            .unwrap_or_else(|| self.component.clone())
    }

    pub fn fronts(&self, target: &ComponentName) -> bool {
        match self.handle.fronted_component() {
            Some(fronted) => &fronted == target,
            None => &self.component == target,
        }
    }
}

impl fmt::Debug for ComponentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRecord")
            .field("id", &self.id)
            .field("component", &self.component)
            .field("finishing", &self.handle.is_finishing())
            .finish()
    }
}
