//! Typed handles bound to a resolved address

use super::active::{ActiveMemory, ActiveMemorySet};
use super::codec::MemoryType;
use crate::core::types::{Address, MemoryError, MemoryResult};
use crate::process::SharedProcess;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Everything a factory needs to build a [`Memory`] handle
pub struct MemoryBinding {
    pub process: SharedProcess,
    pub address: Address,
    pub description: String,
    pub active: Arc<ActiveMemorySet>,
}

/// A value of type `T` living at a fixed address in the target process.
///
/// `get` and `set` always go to the process. `tick` does the same read but
/// also stores the result, so [`Memory::value`] and subscribers see the last
/// refreshed value without touching the process.
pub struct Memory<T: MemoryType> {
    id: u64,
    process: SharedProcess,
    address: Address,
    description: String,
    active: Arc<ActiveMemorySet>,
    retired: AtomicBool,
    refreshes: AtomicU64,
    cache: watch::Sender<Option<T>>,
}

impl<T: MemoryType> Memory<T> {
    /// Default factory: binds a handle without registering it for refresh
    pub fn bind(binding: MemoryBinding) -> Self {
        let (cache, _) = watch::channel(None);
        Memory {
            id: binding.active.next_id(),
            process: binding.process,
            address: binding.address,
            description: binding.description,
            active: binding.active,
            retired: AtomicBool::new(false),
            refreshes: AtomicU64::new(0),
            cache,
        }
    }

    /// Reads and decodes the current value
    pub fn get(&self) -> MemoryResult<T> {
        let bytes = self.process.read_bytes(self.address, T::SIZE)?;
        T::decode(&bytes).ok_or_else(|| {
            MemoryError::read_failed(
                self.address,
                format!("cannot decode {} from {} bytes", T::NAME, bytes.len()),
            )
        })
    }

    /// Encodes and writes `value`
    pub fn set(&self, value: T) -> MemoryResult<()> {
        self.process.write_bytes(self.address, &value.encode())?;
        self.store(value);
        Ok(())
    }

    /// Last value seen by `tick` or written by `set`
    pub fn value(&self) -> Option<T> {
        self.cache.borrow().clone()
    }

    /// Receiver notified whenever the cached value changes
    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.cache.subscribe()
    }

    /// How many times this handle has been refreshed
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// `TypeName [d1, d2, ...] (address)`
    pub fn describe(&self) -> &str {
        &self.description
    }

    /// Removes this handle from refresh; idempotent
    pub fn retire(&self) {
        if !self.retired.swap(true, Ordering::SeqCst) {
            self.active.remove(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.retired.load(Ordering::SeqCst) && self.active.contains(self.id)
    }

    fn store(&self, value: T) {
        self.cache.send_if_modified(|slot| {
            if slot.as_ref() == Some(&value) {
                false
            } else {
                *slot = Some(value);
                true
            }
        });
    }
}

impl<T: MemoryType> ActiveMemory for Memory<T> {
    fn id(&self) -> u64 {
        self.id
    }

    fn tick(&self) -> MemoryResult<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let value = self.get()?;
        self.store(value);
        Ok(())
    }

    fn describe(&self) -> &str {
        &self.description
    }
}

impl<T: MemoryType> Drop for Memory<T> {
    fn drop(&mut self) {
        self.retire();
    }
}

impl<T: MemoryType> fmt::Debug for Memory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("retired", &self.retired.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vector;
    use crate::process::SimulatedProcess;

    fn bound<T: MemoryType>(process: &Arc<SimulatedProcess>, address: u64) -> Arc<Memory<T>> {
        let active = Arc::new(ActiveMemorySet::new());
        let memory = Arc::new(Memory::<T>::bind(MemoryBinding {
            process: process.clone(),
            address: Address::new(address),
            description: format!("{} [{address:02X}]", T::NAME),
            active: Arc::clone(&active),
        }));
        active.insert(&memory);
        memory
    }

    #[test]
    fn test_get_and_set() {
        let process = Arc::new(SimulatedProcess::new(1, "game.exe"));
        process.map_bytes(Address::new(0x1000), &1234i32.to_le_bytes());
        let memory = bound::<i32>(&process, 0x1000);

        assert_eq!(memory.get().unwrap(), 1234);
        memory.set(-5).unwrap();
        assert_eq!(memory.get().unwrap(), -5);
        assert_eq!(memory.value(), Some(-5));
    }

    #[test]
    fn test_tick_caches_and_counts() {
        let process = Arc::new(SimulatedProcess::new(1, "game.exe"));
        process.map_bytes(Address::new(0x2000), &Vector::new(1.0, 2.0, 3.0).encode());
        let memory = bound::<Vector>(&process, 0x2000);
        let mut updates = memory.subscribe();

        assert_eq!(memory.value(), None);
        memory.tick().unwrap();
        assert_eq!(memory.value(), Some(Vector::new(1.0, 2.0, 3.0)));
        assert!(updates.has_changed().unwrap());
        updates.borrow_and_update();

        // Unchanged value does not notify
        memory.tick().unwrap();
        assert!(!updates.has_changed().unwrap());
        assert_eq!(memory.refresh_count(), 2);
    }

    #[test]
    fn test_failed_tick_is_counted_and_reported() {
        let process = Arc::new(SimulatedProcess::new(1, "game.exe"));
        let memory = bound::<u32>(&process, 0x9000);

        assert!(memory.tick().is_err());
        assert_eq!(memory.refresh_count(), 1);
        assert_eq!(memory.value(), None);
    }

    #[test]
    fn test_retire_and_drop_leave_the_active_set() {
        let process = Arc::new(SimulatedProcess::new(1, "game.exe"));
        let memory = bound::<u8>(&process, 0x1000);
        let active = Arc::clone(&memory.active);

        assert!(memory.is_active());
        memory.retire();
        memory.retire();
        assert!(!memory.is_active());
        assert!(active.is_empty());

        let other = bound::<u8>(&process, 0x1000);
        let other_active = Arc::clone(&other.active);
        assert_eq!(other_active.len(), 1);
        drop(other);
        assert!(other_active.is_empty());
    }
}
