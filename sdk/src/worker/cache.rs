//! Bounded LRU cache of in-memory workflow runs, keyed by run id.
//!
//! Each entry carries its own async lock. The decision task handler holds it
//! for the whole task, so tasks of one run never interleave while tasks of
//! different runs proceed concurrently. An entry whose lock is held is never
//! evicted; a task that acquires the lock of an entry that left the map in
//! the meantime must start over with [`WorkflowCache::get_or_insert`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::workflow::execution::WorkflowExecution;

pub(crate) type CachedSlot = OwnedMutexGuard<Option<WorkflowExecution>>;

/// One cache slot; empty until a decision task populates it
#[derive(Default)]
pub struct CachedWorkflow {
    execution: Arc<tokio::sync::Mutex<Option<WorkflowExecution>>>,
}

impl CachedWorkflow {
    pub(crate) async fn lock(&self) -> CachedSlot {
        Arc::clone(&self.execution).lock_owned().await
    }

    /// Whether no task currently holds this entry
    pub fn is_idle(&self) -> bool {
        self.execution.try_lock().is_ok()
    }

    /// Last history event applied to the cached run, if populated and idle
    pub fn last_event_id(&self) -> Option<i64> {
        self.execution
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|e| e.last_event_id()))
    }
}

impl std::fmt::Debug for CachedWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedWorkflow")
            .field("last_event_id", &self.last_event_id())
            .finish()
    }
}

struct CacheSlot {
    entry: Arc<CachedWorkflow>,
    last_used: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheSlot>,
    /// Run ids ordered by last use, oldest first
    recency: BTreeMap<u64, String>,
    clock: u64,
}

impl CacheInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn insert(&mut self, run_id: &str, entry: Arc<CachedWorkflow>) {
        let now = self.tick();
        let slot = CacheSlot {
            entry,
            last_used: now,
        };
        if let Some(previous) = self.entries.insert(run_id.to_string(), slot) {
            self.recency.remove(&previous.last_used);
        }
        self.recency.insert(now, run_id.to_string());
    }

    fn touch(&mut self, run_id: &str) -> Option<Arc<CachedWorkflow>> {
        let now = self.tick();
        let slot = self.entries.get_mut(run_id)?;
        let previous = std::mem::replace(&mut slot.last_used, now);
        let entry = Arc::clone(&slot.entry);
        self.recency.remove(&previous);
        self.recency.insert(now, run_id.to_string());
        Some(entry)
    }

    fn remove(&mut self, run_id: &str) -> Option<CacheSlot> {
        let slot = self.entries.remove(run_id)?;
        self.recency.remove(&slot.last_used);
        Some(slot)
    }

    /// Drop idle entries, oldest first, until the map fits. Entries in use
    /// stay, so the map may exceed `capacity` while they are held.
    fn evict_overflow(&mut self, capacity: usize, keep: &str) {
        let excess = self.entries.len().saturating_sub(capacity);
        if excess == 0 {
            return;
        }

        let entries = &self.entries;
        let victims: Vec<String> = self
            .recency
            .values()
            .filter(|run_id| run_id.as_str() != keep)
            .filter(|run_id| entries.get(*run_id).is_some_and(|slot| slot.entry.is_idle()))
            .take(excess)
            .cloned()
            .collect();

        for run_id in victims {
            debug!(run_id = %run_id, "Evicting least recently used workflow");
            self.remove(&run_id);
        }
    }
}

/// Bounded map from run id to cached workflow state
pub struct WorkflowCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl WorkflowCache {
    /// A capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, run_id: &str) -> Option<Arc<CachedWorkflow>> {
        self.inner.lock().touch(run_id)
    }

    /// Existing entry for `run_id`, or a new empty one; the flag tells whether it existed
    pub fn get_or_insert(&self, run_id: &str) -> (Arc<CachedWorkflow>, bool) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.touch(run_id) {
            return (entry, true);
        }

        let entry = Arc::new(CachedWorkflow::default());
        inner.insert(run_id, Arc::clone(&entry));
        inner.evict_overflow(self.capacity, run_id);
        (entry, false)
    }

    /// Insert or replace the entry and mark it most recently used
    pub fn put(&self, run_id: &str, entry: Arc<CachedWorkflow>) {
        let mut inner = self.inner.lock();
        inner.insert(run_id, entry);
        inner.evict_overflow(self.capacity, run_id);
    }

    /// Remove the entry unless a task is processing it; returns whether it was removed
    pub fn evict(&self, run_id: &str) -> bool {
        let mut inner = self.inner.lock();
        let idle = match inner.entries.get(run_id) {
            Some(slot) => slot.entry.is_idle(),
            None => return false,
        };
        if idle {
            inner.remove(run_id);
        }
        idle
    }

    /// Whether `entry` is still the one stored for `run_id`
    pub(crate) fn is_current(&self, run_id: &str, entry: &Arc<CachedWorkflow>) -> bool {
        self.inner
            .lock()
            .entries
            .get(run_id)
            .is_some_and(|slot| Arc::ptr_eq(&slot.entry, entry))
    }

    /// Remove `entry` on behalf of the task holding its lock
    pub(crate) fn remove_held(&self, run_id: &str, entry: &Arc<CachedWorkflow>) {
        let mut inner = self.inner.lock();
        let current = inner
            .entries
            .get(run_id)
            .is_some_and(|slot| Arc::ptr_eq(&slot.entry, entry));
        if current {
            inner.remove(run_id);
        }
    }

    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn contains(&self, run_id: &str) -> bool {
        self.inner.lock().entries.contains_key(run_id)
    }
}

impl std::fmt::Debug for WorkflowCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowCache")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .finish()
    }
}
