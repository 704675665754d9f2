//! The set of handles refreshed by the ticker

use crate::core::types::MemoryResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, trace};

/// A handle that takes part in periodic refresh
pub trait ActiveMemory: Send + Sync {
    /// Key in the active set, unique per set
    fn id(&self) -> u64;

    /// Re-reads the current value from the process
    fn tick(&self) -> MemoryResult<()>;

    /// Human-readable description for logs
    fn describe(&self) -> &str;
}

/// Outcome of one refresh pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ticked: usize,
    pub failed: usize,
}

/// Handles currently subscribed to refresh.
///
/// Holds weak references only, so membership never keeps a handle alive.
/// Membership changes and snapshotting are serialized by one lock; ticking runs
/// on a snapshot with the lock released.
#[derive(Default)]
pub struct ActiveMemorySet {
    members: Mutex<HashMap<u64, Weak<dyn ActiveMemory>>>,
    next_id: AtomicU64,
}

impl ActiveMemorySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id for a new handle
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn members(&self) -> MutexGuard<'_, HashMap<u64, Weak<dyn ActiveMemory>>> {
        match self.members.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Subscribes `memory` to refresh
    pub fn insert<M: ActiveMemory + 'static>(&self, memory: &Arc<M>) {
        let weak: Weak<dyn ActiveMemory> = Arc::downgrade(memory) as Weak<dyn ActiveMemory>;
        self.members().insert(memory.id(), weak);
    }

    /// Unsubscribes the handle with `id`; returns whether it was a member
    pub fn remove(&self, id: u64) -> bool {
        self.members().remove(&id).is_some()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.members().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members().is_empty()
    }

    /// Live members at this instant, dropping entries whose handle is gone
    pub fn snapshot(&self) -> Vec<Arc<dyn ActiveMemory>> {
        let mut members = self.members();
        members.retain(|_, weak| weak.strong_count() > 0);
        members.values().filter_map(Weak::upgrade).collect()
    }

    /// Ticks every member once. A failing handle is logged and skipped.
    pub fn tick_all(&self) -> TickReport {
        let mut report = TickReport::default();

        for memory in self.snapshot() {
            report.ticked += 1;
            if let Err(e) = memory.tick() {
                report.failed += 1;
                if e.is_transient() {
                    trace!(id = memory.id(), "Tick skipped for {}: {}", memory.describe(), e);
                } else {
                    debug!(id = memory.id(), "Tick failed for {}: {}", memory.describe(), e);
                }
            }
        }

        report
    }
}
