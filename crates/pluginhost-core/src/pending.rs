//! Launch requests waiting for their plugin runtime.
//!
//! Two process-wide collections: a per-package FIFO *cache* of requests that
//! have not been dispatched yet, and a *loading* list of requests that were
//! dispatched but whose component has not been created.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use pluginhost_protocols::{ComponentName, Intent};

/// A parked launch intent.
#[derive(Debug, Clone, Serialize)]
pub struct PendingIntentRequest {
    pub id: Uuid,
    pub package: String,
    pub intent: Intent,
    pub requested_at: DateTime<Utc>,
    /// Set when the request moves from the cache to the loading list.
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl PendingIntentRequest {
    pub fn new(package: impl Into<String>, intent: Intent) -> Self {
        Self {
            id: Uuid::new_v4(),
            package: package.into(),
            intent,
            requested_at: Utc::now(),
            dispatched_at: None,
        }
    }

    pub fn target(&self) -> Option<&ComponentName> {
        self.intent.component.as_ref()
    }

    pub fn targets(&self, component: &ComponentName) -> bool {
        self.intent.targets(component)
    }
}

/// Cache and loading list of pending launch requests.
#[derive(Default)]
pub struct PendingIntents {
    cache: DashMap<String, VecDeque<PendingIntentRequest>>,
    loading: Mutex<Vec<PendingIntentRequest>>,
}

impl PendingIntents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `intent` until `package` is ready.
    pub fn park(&self, package: &str, intent: Intent) -> Uuid {
        let request = PendingIntentRequest::new(package, intent);
        let id = request.id;
        info!(plugin = %package, request = %id, target = ?request.target(), "parked launch request");
        self.cache
            .entry(package.to_string())
            .or_default()
            .push_back(request);
        id
    }

    /// Snapshot of the cached requests for `package`, oldest first.
    pub fn cached(&self, package: &str) -> Vec<PendingIntentRequest> {
        self.cache
            .get(package)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn cached_len(&self, package: &str) -> usize {
        self.cache.get(package).map(|queue| queue.len()).unwrap_or(0)
    }

    /// Cached requests across every package.
    pub fn cached_total(&self) -> usize {
        self.cache.iter().map(|entry| entry.value().len()).sum()
    }

    /// Remove and return every cached request for `package`, oldest first.
    pub fn take_cached(&self, package: &str) -> Vec<PendingIntentRequest> {
        self.cache
            .remove(package)
            .map(|(_, queue)| queue.into_iter().collect())
            .unwrap_or_default()
    }

    /// Record a dispatched request as loading.
    pub fn begin_loading(&self, mut request: PendingIntentRequest) {
        request.dispatched_at = Some(Utc::now());
        debug!(request = %request.id, "request loading");
        self.loading.lock().push(request);
    }

    /// Retire the oldest loading request targeting `component`.
    pub fn complete(&self, component: &ComponentName) -> Option<PendingIntentRequest> {
        let mut loading = self.loading.lock();
        let index = loading.iter().position(|r| r.targets(component))?;
        let request = loading.remove(index);
        debug!(request = %request.id, component = %component, "request completed");
        Some(request)
    }

    pub fn loading(&self) -> Vec<PendingIntentRequest> {
        self.loading.lock().clone()
    }

    pub fn loading_len(&self) -> usize {
        self.loading.lock().len()
    }

    /// First request targeting `component`, searching the package's cache
    /// and then the loading list, oldest first.
    ///
    /// Superseded requests are not invalidated; the oldest match wins.
    pub fn find_targeting(&self, package: &str, component: &ComponentName) -> Option<Uuid> {
        if let Some(queue) = self.cache.get(package) {
            if let Some(request) = queue.iter().find(|r| r.targets(component)) {
                return Some(request.id);
            }
        }
        self.loading
            .lock()
            .iter()
            .find(|r| r.targets(component))
            .map(|r| r.id)
    }

    /// Drop everything pending for `package`. Returns how many were dropped.
    pub fn clear(&self, package: &str) -> usize {
        let cached = self.cache.remove(package).map(|(_, q)| q.len()).unwrap_or(0);
        let mut loading = self.loading.lock();
        let before = loading.len();
        loading.retain(|r| r.package != package);
        let dropped = cached + before - loading.len();
        if dropped > 0 {
            info!(plugin = %package, dropped, "cleared pending requests");
        }
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.cache.iter().all(|entry| entry.value().is_empty()) && self.loading.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::component;

    const PLUGIN: &str = "com.example.plugin";

    fn intent_for(class: &str) -> Intent {
        Intent::new(component(PLUGIN, class))
    }

    #[test]
    fn test_park_is_fifo_per_package() {
        let pending = PendingIntents::new();
        let first = pending.park(PLUGIN, intent_for("A"));
        let second = pending.park(PLUGIN, intent_for("B"));
        pending.park("com.other", Intent::new(component("com.other", "X")));

        let cached = pending.cached(PLUGIN);
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[0].id, first);
        assert_eq!(cached[1].id, second);
        assert_eq!(pending.cached_len("com.other"), 1);
    }

    #[test]
    fn test_take_cached_then_loading() {
        let pending = PendingIntents::new();
        pending.park(PLUGIN, intent_for("A"));

        let taken = pending.take_cached(PLUGIN);
        assert_eq!(taken.len(), 1);
        assert_eq!(pending.cached_len(PLUGIN), 0);

        for request in taken {
            pending.begin_loading(request);
        }
        assert_eq!(pending.loading_len(), 1);
        assert!(pending.loading()[0].dispatched_at.is_some());

        assert!(pending.complete(&component(PLUGIN, "A")).is_some());
        assert!(pending.complete(&component(PLUGIN, "A")).is_none());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_find_targeting_prefers_oldest_cache_entry() {
        let pending = PendingIntents::new();
        let oldest = pending.park(PLUGIN, intent_for("A"));
        let _newer = pending.park(PLUGIN, intent_for("A"));

        assert_eq!(pending.find_targeting(PLUGIN, &component(PLUGIN, "A")), Some(oldest));
        assert!(pending.find_targeting(PLUGIN, &component(PLUGIN, "B")).is_none());
    }

    #[test]
    fn test_find_targeting_searches_loading() {
        let pending = PendingIntents::new();
        let request = PendingIntentRequest::new(PLUGIN, intent_for("A"));
        let id = request.id;
        pending.begin_loading(request);

        assert_eq!(pending.find_targeting(PLUGIN, &component(PLUGIN, "A")), Some(id));
    }

    #[test]
    fn test_clear_drops_cache_and_loading() {
        let pending = PendingIntents::new();
        pending.park(PLUGIN, intent_for("A"));
        pending.begin_loading(PendingIntentRequest::new(PLUGIN, intent_for("B")));
        pending.begin_loading(PendingIntentRequest::new(
            "com.other",
            Intent::new(component("com.other", "X")),
        ));

        assert_eq!(pending.clear(PLUGIN), 2);
        assert_eq!(pending.loading_len(), 1);
        assert_eq!(pending.clear(PLUGIN), 0);
    }
}
