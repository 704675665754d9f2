//! Kernel32.dll bindings for process and memory operations

use crate::core::types::{MemoryError, MemoryResult};
use crate::windows::utils::string_conv::wide_to_string;
use winapi::shared::minwindef::{BOOL, DWORD, FALSE, LPCVOID, LPVOID};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::handleapi::CloseHandle;
use winapi::um::memoryapi::{ReadProcessMemory, WriteProcessMemory};
use winapi::um::minwinbase::STILL_ACTIVE;
use winapi::um::processthreadsapi::{GetExitCodeProcess, OpenProcess};
use winapi::um::winbase::QueryFullProcessImageNameW;
use winapi::um::winnt::HANDLE;
use winapi::um::wow64apiset::IsWow64Process;

/// Last OS error code for the calling thread
pub fn last_error() -> DWORD {
    unsafe { GetLastError() }
}

/// Safe wrapper for OpenProcess
pub fn open_process(pid: u32, desired_access: u32) -> MemoryResult<HANDLE> {
    unsafe {
        let handle = OpenProcess(desired_access, FALSE, pid);
        if handle.is_null() {
            Err(MemoryError::OpenFailed {
                pid,
                reason: format!("OpenProcess failed (error {})", last_error()),
            })
        } else {
            Ok(handle)
        }
    }
}

/// Safe wrapper for CloseHandle
///
/// # Safety
/// The handle must be a valid Windows handle
pub unsafe fn close_handle(handle: HANDLE) -> MemoryResult<()> {
    if handle.is_null() {
        return Ok(());
    }

    if CloseHandle(handle) == FALSE {
        Err(MemoryError::WindowsApi(format!(
            "CloseHandle failed (error {})",
            last_error()
        )))
    } else {
        Ok(())
    }
}

/// Safe wrapper for ReadProcessMemory; returns the number of bytes read
///
/// # Safety
/// The handle must be a valid process handle with `PROCESS_VM_READ`
pub unsafe fn read_process_memory(
    handle: HANDLE,
    address: usize,
    buffer: &mut [u8],
) -> MemoryResult<usize> {
    let mut bytes_read = 0;

    let result = ReadProcessMemory(
        handle,
        address as LPCVOID,
        buffer.as_mut_ptr() as LPVOID,
        buffer.len(),
        &mut bytes_read,
    );

    if result == FALSE {
        Err(MemoryError::read_failed(
            format!("0x{:X}", address),
            format!("ReadProcessMemory failed (error {})", last_error()),
        ))
    } else {
        Ok(bytes_read)
    }
}

/// Safe wrapper for WriteProcessMemory; returns the number of bytes written
///
/// # Safety
/// The handle must be a valid process handle with `PROCESS_VM_WRITE`
pub unsafe fn write_process_memory(
    handle: HANDLE,
    address: usize,
    data: &[u8],
) -> MemoryResult<usize> {
    let mut bytes_written = 0;

    let result = WriteProcessMemory(
        handle,
        address as LPVOID,
        data.as_ptr() as LPCVOID,
        data.len(),
        &mut bytes_written,
    );

    if result == FALSE {
        Err(MemoryError::write_failed(
            format!("0x{:X}", address),
            format!("WriteProcessMemory failed (error {})", last_error()),
        ))
    } else {
        Ok(bytes_written)
    }
}

/// True while the process has not exited
///
/// # Safety
/// The handle must be a valid process handle with query access
pub unsafe fn is_process_running(handle: HANDLE) -> MemoryResult<bool> {
    let mut code: DWORD = 0;
    if GetExitCodeProcess(handle, &mut code) == FALSE {
        return Err(MemoryError::WindowsApi(format!(
            "GetExitCodeProcess failed (error {})",
            last_error()
        )));
    }
    Ok(code == STILL_ACTIVE)
}

/// Whether a process runs under WoW64, i.e. is 32-bit on 64-bit Windows
///
/// # Safety
/// The handle must be a valid process handle with query access
pub unsafe fn is_wow64_process(handle: HANDLE) -> MemoryResult<bool> {
    let mut wow64: BOOL = FALSE;
    if IsWow64Process(handle, &mut wow64) == FALSE {
        return Err(MemoryError::WindowsApi(format!(
            "IsWow64Process failed (error {})",
            last_error()
        )));
    }
    Ok(wow64 != FALSE)
}

/// Full path of the process executable
///
/// # Safety
/// The handle must be a valid process handle with query access
pub unsafe fn query_full_process_image_name(handle: HANDLE) -> MemoryResult<String> {
    let mut buffer = vec![0u16; 1024];
    let mut length = buffer.len() as DWORD;

    if QueryFullProcessImageNameW(handle, 0, buffer.as_mut_ptr(), &mut length) == FALSE {
        return Err(MemoryError::WindowsApi(format!(
            "QueryFullProcessImageNameW failed (error {})",
            last_error()
        )));
    }

    Ok(wide_to_string(&buffer[..length as usize]))
}
