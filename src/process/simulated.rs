//! In-memory process backend
//!
//! Stands in for a real target when no game is running: drives the test suite
//! and the binary on platforms without a native backend. Memory is a sparse set
//! of mapped regions; anything outside them reads and writes as unmapped.

use super::handle::{ProcessHandle, ProcessLocator, SharedProcess};
use crate::core::types::{
    Address, MemoryError, MemoryResult, ProcessArchitecture, ProcessId, ProcessInfo,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::trace;

/// Default module base, matching a typical 64-bit image base
pub const DEFAULT_BASE: Address = Address::new(0x1_4000_0000);

/// A fake process whose memory lives in this process
#[derive(Debug)]
pub struct SimulatedProcess {
    pid: ProcessId,
    name: String,
    path: Option<PathBuf>,
    base: Address,
    pointer_size: usize,
    alive: AtomicBool,
    read_only: AtomicBool,
    regions: RwLock<BTreeMap<u64, Vec<u8>>>,
    reads: AtomicU64,
}

impl SimulatedProcess {
    /// Creates a live process with the default module base
    pub fn new(pid: ProcessId, name: impl Into<String>) -> Self {
        SimulatedProcess {
            pid,
            name: name.into(),
            path: None,
            base: DEFAULT_BASE,
            pointer_size: 8,
            alive: AtomicBool::new(true),
            read_only: AtomicBool::new(false),
            regions: RwLock::new(BTreeMap::new()),
            reads: AtomicU64::new(0),
        }
    }

    pub fn with_base(mut self, base: Address) -> Self {
        self.base = base;
        self
    }

    pub fn with_pointer_size(mut self, pointer_size: usize) -> Self {
        self.pointer_size = pointer_size;
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Describes this process the way a locator would list it
    pub fn info(&self) -> ProcessInfo {
        let architecture = if self.pointer_size == 4 {
            ProcessArchitecture::X86
        } else {
            ProcessArchitecture::X64
        };
        let info = ProcessInfo::new(self.pid, self.name.clone()).with_architecture(architecture);
        match &self.path {
            Some(path) => info.with_path(path.clone()),
            None => info,
        }
    }

    /// Maps a zero-filled region of `length` bytes at `address`
    pub fn map(&self, address: Address, length: usize) {
        self.map_bytes(address, &vec![0u8; length]);
    }

    /// Places `bytes` at `address`, mapping a new region unless an existing
    /// region already covers the whole range. Regions must not partially overlap.
    pub fn map_bytes(&self, address: Address, bytes: &[u8]) {
        let mut regions = match self.regions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some((start, region)) = find_region_mut(&mut regions, address, bytes.len()) {
            let offset = (address.as_u64() - start) as usize;
            region[offset..offset + bytes.len()].copy_from_slice(bytes);
        } else {
            regions.insert(address.as_u64(), bytes.to_vec());
        }
        trace!(pid = self.pid, %address, len = bytes.len(), "mapped simulated bytes");
    }

    /// Seeds memory from a hex string such as `"deadbeef"`
    pub fn write_hex(&self, address: Address, hex_bytes: &str) -> MemoryResult<()> {
        let bytes =
            hex::decode(hex_bytes).map_err(|e| MemoryError::InvalidOffset(e.to_string()))?;
        self.map_bytes(address, &bytes);
        Ok(())
    }

    /// Stores a little-endian `u64` at `address`
    pub fn write_u64(&self, address: Address, value: u64) {
        self.map_bytes(address, &value.to_le_bytes());
    }

    /// Stores a pointer to `target` at `address`, using the target's pointer width
    pub fn write_pointer(&self, address: Address, target: Address) {
        let bytes = target.as_u64().to_le_bytes();
        self.map_bytes(address, &bytes[..self.pointer_size]);
    }

    /// Simulates the process exiting
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Makes every write fail with an access error
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of successful and failed `read_bytes` calls so far
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

fn find_region_mut(
    regions: &mut BTreeMap<u64, Vec<u8>>,
    address: Address,
    length: usize,
) -> Option<(u64, &mut Vec<u8>)> {
    let (start, region) = regions.range_mut(..=address.as_u64()).next_back()?;
    let end = start.checked_add(region.len() as u64)?;
    let wanted_end = address.as_u64().checked_add(length as u64)?;
    (wanted_end <= end).then_some((*start, region))
}

impl ProcessHandle for SimulatedProcess {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn base_address(&self) -> Address {
        self.base
    }

    fn read_bytes(&self, address: Address, length: usize) -> MemoryResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.is_alive() {
            return Err(MemoryError::ProcessExited(self.pid));
        }

        let regions = match self.regions.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (start, region) = regions
            .range(..=address.as_u64())
            .next_back()
            .ok_or_else(|| MemoryError::read_failed(address, "unmapped"))?;

        let offset = address.as_u64() - start;
        let end = offset
            .checked_add(length as u64)
            .filter(|end| *end <= region.len() as u64)
            .ok_or_else(|| MemoryError::read_failed(address, "unmapped"))?;

        Ok(region[offset as usize..end as usize].to_vec())
    }

    fn write_bytes(&self, address: Address, data: &[u8]) -> MemoryResult<()> {
        if !self.is_alive() {
            return Err(MemoryError::ProcessExited(self.pid));
        }
        if self.read_only.load(Ordering::SeqCst) {
            return Err(MemoryError::write_failed(address, "access denied"));
        }

        let mut regions = match self.regions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let (start, region) = find_region_mut(&mut regions, address, data.len())
            .ok_or_else(|| MemoryError::write_failed(address, "unmapped"))?;

        let offset = (address.as_u64() - start) as usize;
        region[offset..offset + data.len()].copy_from_slice(data);
        trace!(pid = self.pid, %address, bytes = %hex::encode(data), "simulated write");
        Ok(())
    }

    fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    fn executable_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// A fake process table for [`SimulatedProcess`]es
#[derive(Debug, Default)]
pub struct SimulatedSystem {
    processes: RwLock<Vec<Arc<SimulatedProcess>>>,
    opens: AtomicU64,
}

impl SimulatedSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a process to the table and returns a handle for driving it
    pub fn spawn(&self, process: SimulatedProcess) -> Arc<SimulatedProcess> {
        let process = Arc::new(process);
        match self.processes.write() {
            Ok(mut guard) => guard.push(Arc::clone(&process)),
            Err(poisoned) => poisoned.into_inner().push(Arc::clone(&process)),
        }
        process
    }

    /// Drops exited processes from the table
    pub fn reap(&self) {
        if let Ok(mut guard) = self.processes.write() {
            guard.retain(|p| p.is_alive());
        }
    }

    /// Number of successful `open` calls
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    fn live(&self) -> Vec<Arc<SimulatedProcess>> {
        match self.processes.read() {
            Ok(guard) => guard.iter().filter(|p| p.is_alive()).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl ProcessLocator for SimulatedSystem {
    fn processes(&self) -> MemoryResult<Vec<ProcessInfo>> {
        Ok(self.live().iter().map(|p| p.info()).collect())
    }

    fn open(&self, info: &ProcessInfo) -> MemoryResult<SharedProcess> {
        let process = self
            .live()
            .into_iter()
            .find(|p| p.pid == info.pid)
            .ok_or_else(|| MemoryError::OpenFailed {
                pid: info.pid,
                reason: "process is not running".to_string(),
            })?;

        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(process as SharedProcess)
    }
}
