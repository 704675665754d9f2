//! Process enumeration using Windows ToolHelp32 API

use crate::core::types::{MemoryError, MemoryResult, ProcessInfo};
use crate::windows::bindings::kernel32::last_error;
use crate::windows::types::Handle;
use std::mem;
use winapi::shared::minwindef::FALSE;
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use winapi::um::tlhelp32::{
    CreateToolhelp32Snapshot, Process32First, Process32Next, PROCESSENTRY32, TH32CS_SNAPPROCESS,
};

/// Iterates a ToolHelp32 process snapshot
pub struct ProcessEnumerator {
    snapshot: Handle,
    first_called: bool,
}

impl ProcessEnumerator {
    /// Takes a snapshot of the running processes
    pub fn new() -> MemoryResult<Self> {
        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0);
            if snapshot.is_null() || snapshot == INVALID_HANDLE_VALUE {
                return Err(MemoryError::WindowsApi(format!(
                    "Failed to create process snapshot (error {})",
                    last_error()
                )));
            }
            Ok(ProcessEnumerator {
                snapshot: Handle::new(snapshot),
                first_called: false,
            })
        }
    }

    fn next_process(&mut self) -> Option<ProcessInfo> {
        unsafe {
            let mut entry: PROCESSENTRY32 = mem::zeroed();
            entry.dwSize = mem::size_of::<PROCESSENTRY32>() as u32;

            let success = if !self.first_called {
                self.first_called = true;
                Process32First(self.snapshot.raw(), &mut entry)
            } else {
                Process32Next(self.snapshot.raw(), &mut entry)
            };

            if success == FALSE {
                return None;
            }

            // szExeFile is a NUL-terminated ANSI buffer
            let name = {
                let name_bytes = &entry.szExeFile;
                let null_pos = name_bytes
                    .iter()
                    .position(|&c| c == 0)
                    .unwrap_or(name_bytes.len());
                let name_u8: Vec<u8> = name_bytes[..null_pos].iter().map(|&c| c as u8).collect();
                String::from_utf8_lossy(&name_u8).into_owned()
            };

            Some(ProcessInfo::new(entry.th32ProcessID, name))
        }
    }
}

impl Iterator for ProcessEnumerator {
    type Item = ProcessInfo;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_process()
    }
}

/// Enumerate all running processes
pub fn enumerate_processes() -> MemoryResult<Vec<ProcessInfo>> {
    Ok(ProcessEnumerator::new()?.collect())
}
