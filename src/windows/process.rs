//! Native process backend

use crate::core::types::{
    Address, MemoryError, MemoryResult, ModuleInfo, ProcessArchitecture, ProcessId, ProcessInfo,
};
use crate::process::{ProcessHandle, ProcessLocator, SharedProcess};
use crate::windows::bindings::{kernel32, psapi};
use crate::windows::enumerator::enumerate_processes;
use crate::windows::types::Handle;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};
use winapi::um::winnt::{
    PROCESS_QUERY_INFORMATION, PROCESS_VM_OPERATION, PROCESS_VM_READ, PROCESS_VM_WRITE,
};

const ACCESS: u32 =
    PROCESS_VM_READ | PROCESS_VM_WRITE | PROCESS_VM_OPERATION | PROCESS_QUERY_INFORMATION;

/// An opened Windows process; the handle is closed on drop
pub struct WindowsProcess {
    handle: Handle,
    pid: ProcessId,
    name: String,
    path: Option<PathBuf>,
    module: ModuleInfo,
    pointer_size: usize,
}

impl WindowsProcess {
    /// Opens `info.pid` for reading and writing and locates its main module
    pub fn open(info: &ProcessInfo) -> MemoryResult<Self> {
        let handle = Handle::new(kernel32::open_process(info.pid, ACCESS)?);
        if !handle.is_valid() {
            return Err(MemoryError::InvalidHandle(format!("process {}", info.pid)));
        }
        let open_failed = |reason: String| MemoryError::OpenFailed {
            pid: info.pid,
            reason,
        };

        let (module, pointer_size, path) = unsafe {
            let modules =
                psapi::enum_process_modules(handle.raw()).map_err(|e| open_failed(e.to_string()))?;
            let main = *modules
                .first()
                .ok_or_else(|| open_failed("process has no modules".to_string()))?;
            let module_info = psapi::get_module_information(handle.raw(), main)
                .map_err(|e| open_failed(e.to_string()))?;
            let module_name = psapi::get_module_base_name(handle.raw(), main)
                .unwrap_or_else(|_| info.name.clone());

            let wow64 = kernel32::is_wow64_process(handle.raw()).unwrap_or(false);
            let architecture = if wow64 || cfg!(target_pointer_width = "32") {
                ProcessArchitecture::X86
            } else {
                ProcessArchitecture::X64
            };
            let pointer_size = architecture.pointer_size();
            let path = kernel32::query_full_process_image_name(handle.raw())
                .ok()
                .map(PathBuf::from);

            let module = ModuleInfo::new(
                module_name,
                Address::new(module_info.lpBaseOfDll as usize as u64),
                module_info.SizeOfImage as u64,
            );
            (module, pointer_size, path)
        };

        debug!(
            pid = info.pid,
            module = %module.name,
            base = %module.base_address,
            pointer_size,
            "Opened process"
        );

        Ok(WindowsProcess {
            handle,
            pid: info.pid,
            name: info.name.clone(),
            path,
            module,
            pointer_size,
        })
    }

    /// The primary executable module
    pub fn main_module(&self) -> &ModuleInfo {
        &self.module
    }

    fn native_address(
        address: Address,
        on_err: fn(Address, &str) -> MemoryError,
    ) -> MemoryResult<usize> {
        address
            .as_usize()
            .ok_or_else(|| on_err(address, "address exceeds native pointer width"))
    }
}

impl fmt::Debug for WindowsProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowsProcess")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("base", &self.module.base_address)
            .finish()
    }
}

impl ProcessHandle for WindowsProcess {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_alive(&self) -> bool {
        unsafe { kernel32::is_process_running(self.handle.raw()).unwrap_or(false) }
    }

    fn base_address(&self) -> Address {
        self.module.base_address
    }

    fn read_bytes(&self, address: Address, length: usize) -> MemoryResult<Vec<u8>> {
        let native = Self::native_address(address, |a, r| MemoryError::read_failed(a, r))?;
        let mut buffer = vec![0u8; length];

        let read =
            unsafe { kernel32::read_process_memory(self.handle.raw(), native, &mut buffer)? };
        if read != length {
            return Err(MemoryError::read_failed(
                address,
                format!("partial read ({read} of {length} bytes)"),
            ));
        }
        Ok(buffer)
    }

    fn write_bytes(&self, address: Address, data: &[u8]) -> MemoryResult<()> {
        let native = Self::native_address(address, |a, r| MemoryError::write_failed(a, r))?;

        let written = unsafe { kernel32::write_process_memory(self.handle.raw(), native, data)? };
        if written != data.len() {
            return Err(MemoryError::write_failed(
                address,
                format!("partial write ({written} of {} bytes)", data.len()),
            ));
        }
        trace!(pid = self.pid, %address, bytes = %hex::encode(data), "wrote memory");
        Ok(())
    }

    fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    fn executable_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Lists processes through ToolHelp32 and opens them as [`WindowsProcess`]
#[derive(Debug, Default)]
pub struct WindowsProcessLocator;

impl WindowsProcessLocator {
    pub fn new() -> Self {
        WindowsProcessLocator
    }
}

impl ProcessLocator for WindowsProcessLocator {
    fn processes(&self) -> MemoryResult<Vec<ProcessInfo>> {
        enumerate_processes()
    }

    fn open(&self, info: &ProcessInfo) -> MemoryResult<SharedProcess> {
        Ok(Arc::new(WindowsProcess::open(info)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> WindowsProcess {
        let info = ProcessInfo::new(std::process::id(), "self");
        WindowsProcess::open(&info).unwrap()
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_open_current_process() {
        let process = current();
        assert!(process.is_alive());
        assert!(!process.base_address().is_null());
        assert!(process.main_module().size > 0);
        assert!(process.executable_path().is_some());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_read_write_own_memory() {
        let process = current();
        let mut value = Box::new(0u64);
        let address = Address::from(&mut *value as *mut u64 as usize);

        process.write_bytes(address, &42u64.to_le_bytes()).unwrap();
        let bytes = process.read_bytes(address, 8).unwrap();
        assert_eq!(u64::from_le_bytes(bytes.try_into().unwrap()), 42);
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_unmapped_read_fails() {
        let process = current();
        assert!(matches!(
            process.read_bytes(Address::new(0x10), 4),
            Err(MemoryError::ReadFailed { .. })
        ));
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_locator_finds_self() {
        let locator = WindowsProcessLocator::new();
        let me = locator
            .processes()
            .unwrap()
            .into_iter()
            .find(|p| p.pid == std::process::id())
            .unwrap();
        assert_eq!(locator.open(&me).unwrap().pid(), me.pid);
    }
}
