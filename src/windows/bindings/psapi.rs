//! PSAPI.dll bindings for module enumeration

use crate::core::types::{MemoryError, MemoryResult};
use crate::windows::bindings::kernel32::last_error;
use crate::windows::utils::string_conv::wide_to_string;
use winapi::shared::minwindef::{FALSE, HMODULE, MAX_PATH};
use winapi::um::psapi::{EnumProcessModules, GetModuleBaseNameW, GetModuleInformation, MODULEINFO};
use winapi::um::winnt::HANDLE;

/// Safe wrapper for EnumProcessModules. The first module is the executable.
///
/// # Safety
/// The handle must be a valid process handle
pub unsafe fn enum_process_modules(handle: HANDLE) -> MemoryResult<Vec<HMODULE>> {
    let mut modules = vec![std::ptr::null_mut(); 1024];
    let mut bytes_needed = 0u32;

    let result = EnumProcessModules(
        handle,
        modules.as_mut_ptr(),
        (modules.len() * std::mem::size_of::<HMODULE>()) as u32,
        &mut bytes_needed,
    );

    if result == FALSE {
        return Err(MemoryError::WindowsApi(format!(
            "EnumProcessModules failed (error {})",
            last_error()
        )));
    }

    let count = bytes_needed as usize / std::mem::size_of::<HMODULE>();
    modules.truncate(count);

    Ok(modules)
}

/// Safe wrapper for GetModuleInformation
///
/// # Safety
/// The handle must be a valid process handle and module must be valid
pub unsafe fn get_module_information(handle: HANDLE, module: HMODULE) -> MemoryResult<MODULEINFO> {
    let mut info = MODULEINFO {
        lpBaseOfDll: std::ptr::null_mut(),
        SizeOfImage: 0,
        EntryPoint: std::ptr::null_mut(),
    };

    let result = GetModuleInformation(
        handle,
        module,
        &mut info,
        std::mem::size_of::<MODULEINFO>() as u32,
    );

    if result == FALSE {
        return Err(MemoryError::WindowsApi(format!(
            "GetModuleInformation failed (error {})",
            last_error()
        )));
    }

    Ok(info)
}

/// Safe wrapper for GetModuleBaseNameW
///
/// # Safety
/// The handle must be a valid process handle and module must be valid
pub unsafe fn get_module_base_name(handle: HANDLE, module: HMODULE) -> MemoryResult<String> {
    let mut buffer = vec![0u16; MAX_PATH];

    let length = GetModuleBaseNameW(handle, module, buffer.as_mut_ptr(), MAX_PATH as u32);
    if length == 0 {
        return Err(MemoryError::WindowsApi(format!(
            "GetModuleBaseNameW failed (error {})",
            last_error()
        )));
    }

    Ok(wide_to_string(&buffer[..length as usize]))
}
