//! The attached-process contract every backend implements

use crate::core::types::{Address, MemoryError, MemoryResult, ProcessId, ProcessInfo};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// An opened external process.
///
/// Implementations release their OS handle when dropped. Reads and writes fail
/// with an error rather than crashing when the address is unmapped, access is
/// denied, or the process has gone away. All methods may be called
/// concurrently from several threads.
pub trait ProcessHandle: Send + Sync + fmt::Debug {
    /// OS process id
    fn pid(&self) -> ProcessId;

    /// Executable name as reported by the OS
    fn name(&self) -> &str;

    /// Cheap liveness probe, safe to call at high frequency
    fn is_alive(&self) -> bool;

    /// Address of the primary executable module, stable for the attachment
    fn base_address(&self) -> Address;

    /// Reads exactly `length` bytes at `address`
    fn read_bytes(&self, address: Address, length: usize) -> MemoryResult<Vec<u8>>;

    /// Writes all of `data` at `address`
    fn write_bytes(&self, address: Address, data: &[u8]) -> MemoryResult<()>;

    /// Width of a pointer in the target (4 for 32-bit targets)
    fn pointer_size(&self) -> usize {
        8
    }

    /// Full path of the executable, when the backend knows it
    fn executable_path(&self) -> Option<&Path> {
        None
    }

    /// Reads a pointer-sized little-endian value at `address`
    fn read_pointer(&self, address: Address) -> MemoryResult<Address> {
        let size = self.pointer_size();
        let bytes = self.read_bytes(address, size)?;

        match size {
            4 => {
                let raw: [u8; 4] = bytes[..]
                    .try_into()
                    .map_err(|_| MemoryError::read_failed(address, "short pointer read"))?;
                Ok(Address::new(u32::from_le_bytes(raw) as u64))
            }
            8 => {
                let raw: [u8; 8] = bytes[..]
                    .try_into()
                    .map_err(|_| MemoryError::read_failed(address, "short pointer read"))?;
                Ok(Address::new(u64::from_le_bytes(raw)))
            }
            other => Err(MemoryError::read_failed(
                address,
                format!("unsupported pointer size {other}"),
            )),
        }
    }
}

/// Shared, reference-counted process handle
pub type SharedProcess = Arc<dyn ProcessHandle>;

/// Lists candidate processes and opens the chosen one.
///
/// This is the OS-specific half of attachment; choosing exactly one candidate
/// is done by [`crate::process::attach`].
pub trait ProcessLocator: Send + Sync {
    /// Snapshot of the currently running processes
    fn processes(&self) -> MemoryResult<Vec<ProcessInfo>>;

    /// Opens a process previously returned by [`ProcessLocator::processes`]
    fn open(&self, info: &ProcessInfo) -> MemoryResult<SharedProcess>;
}
