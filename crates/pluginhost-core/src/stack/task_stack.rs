//! A single ordered task stack.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::record::ComponentRecord;

static NEXT_STACK_ID: AtomicU64 = AtomicU64::new(1);

/// Which view a stack belongs to.
///
/// Variant order is the lock order: physical stacks are always locked
/// before logical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StackKind {
    Physical,
    Logical,
}

/// Ordered component records of one task; index 0 is the top.
pub struct TaskStack {
    id: u64,
    name: String,
    kind: StackKind,
    records: Mutex<VecDeque<Arc<ComponentRecord>>>,
}

impl TaskStack {
    pub fn new(name: impl Into<String>, kind: StackKind) -> Self {
        Self {
            id: NEXT_STACK_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            kind,
            records: Mutex::new(VecDeque::new()),
        }
    }

    pub fn logical(name: impl Into<String>) -> Self {
        Self::new(name, StackKind::Logical)
    }

    pub fn physical(name: impl Into<String>) -> Self {
        Self::new(name, StackKind::Physical)
    }

    /// Task name: a plugin package (default task) or a task affinity.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StackKind {
        self.kind
    }

    /// Insert `record` at the top. A record already present is left alone.
    pub fn push(&self, record: Arc<ComponentRecord>) -> bool {
        let mut records = self.records.lock();
        if records.iter().any(|r| r.id() == record.id()) {
            return false;
        }
        debug!(stack = %self.name, kind = ?self.kind, component = %record.component(), "push");
        records.push_front(record);
        true
    }

    /// Remove `record` wherever it sits. Returns `false` if it was not here.
    pub fn pop(&self, record: &ComponentRecord) -> bool {
        self.remove(record.id()).is_some()
    }

    pub fn remove(&self, id: Uuid) -> Option<Arc<ComponentRecord>> {
        let mut records = self.records.lock();
        let index = records.iter().position(|r| r.id() == id)?;
        let removed = records.remove(index);
        if let Some(ref record) = removed {
            debug!(stack = %self.name, kind = ?self.kind, component = %record.component(), "pop");
        }
        removed
    }

    pub fn top(&self) -> Option<Arc<ComponentRecord>> {
        self.records.lock().front().cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.records.lock().iter().any(|r| r.id() == id)
    }

    /// Snapshot of the records, top first.
    pub fn records(&self) -> Vec<Arc<ComponentRecord>> {
        self.records.lock().iter().cloned().collect()
    }

    /// First record from the top matching `predicate`, with its index.
    pub fn find<F>(&self, mut predicate: F) -> Option<(usize, Arc<ComponentRecord>)>
    where
        F: FnMut(&ComponentRecord) -> bool,
    {
        self.records
            .lock()
            .iter()
            .enumerate()
            .find(|(_, r)| predicate(r))
            .map(|(i, r)| (i, r.clone()))
    }

    /// Empty the stack, optionally finishing every removed record.
    ///
    /// Records are finished after the lock is released so that destroy
    /// callbacks may re-enter the stack.
    pub fn clear(&self, finish_remaining: bool) -> Vec<Arc<ComponentRecord>> {
        let drained: Vec<_> = self.records.lock().drain(..).collect();
        if finish_remaining {
            for record in &drained {
                record.finish();
            }
        }
        drained
    }

    /// Move every record of `other` onto the top of this stack, keeping
    /// their relative order. `other` is left empty.
    pub fn merge_from(&self, other: &TaskStack) -> usize {
        if std::ptr::eq(self, other) {
            return 0;
        }
        let (mut dst, mut src) = self.lock_pair(other);
        let moved = src.len();
        while let Some(record) = src.pop_back() {
            if !dst.iter().any(|r| r.id() == record.id()) {
                dst.push_front(record);
            }
        }
        debug!(from = %other.name, into = %self.name, moved, "merged stacks");
        moved
    }

    /// Move the records of `other` matching `predicate` onto the top of
    /// this stack, keeping their relative order. Both stacks stay locked
    /// for the whole move.
    pub fn merge_matching_from<F>(&self, other: &TaskStack, mut predicate: F) -> usize
    where
        F: FnMut(&ComponentRecord) -> bool,
    {
        if std::ptr::eq(self, other) {
            return 0;
        }
        let (mut dst, mut src) = self.lock_pair(other);
        let (moving, staying): (VecDeque<_>, VecDeque<_>) =
            src.drain(..).partition(|record| predicate(record));
        *src = staying;
        let moved = moving.len();
        for record in moving.into_iter().rev() {
            if !dst.iter().any(|r| r.id() == record.id()) {
                dst.push_front(record);
            }
        }
        debug!(from = %other.name, into = %self.name, moved, "merged matching records");
        moved
    }

    /// Display names bottom to top.
    pub fn snapshot(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .rev()
            .map(|r| r.component().to_string())
            .collect()
    }

    fn lock_key(&self) -> (StackKind, u64) {
        (self.kind, self.id)
    }

    /// Lock `self` and `other` in global order; returns (self, other) guards.
    fn lock_pair<'a>(
        &'a self,
        other: &'a TaskStack,
    ) -> (
        MutexGuard<'a, VecDeque<Arc<ComponentRecord>>>,
        MutexGuard<'a, VecDeque<Arc<ComponentRecord>>>,
    ) {
        if self.lock_key() < other.lock_key() {
            let mine = self.records.lock();
            let theirs = other.records.lock();
            (mine, theirs)
        } else {
            let theirs = other.records.lock();
            let mine = self.records.lock();
            (mine, theirs)
        }
    }
}

impl fmt::Debug for TaskStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStack")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("records", &self.snapshot())
            .finish()
    }
}
