//! Owned HANDLE with automatic cleanup

use crate::windows::bindings::kernel32;
use std::ptr;
use tracing::debug;
use winapi::um::handleapi::INVALID_HANDLE_VALUE;
use winapi::um::winnt::HANDLE;

/// Owns a Windows HANDLE and closes it on drop
pub struct Handle {
    handle: HANDLE,
}

impl Handle {
    /// Takes ownership of `handle`
    pub fn new(handle: HANDLE) -> Self {
        Handle { handle }
    }

    pub fn null() -> Self {
        Handle {
            handle: ptr::null_mut(),
        }
    }

    /// False for null and `INVALID_HANDLE_VALUE`
    pub fn is_valid(&self) -> bool {
        !self.handle.is_null() && self.handle != INVALID_HANDLE_VALUE
    }

    pub fn raw(&self) -> HANDLE {
        self.handle
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.is_valid() {
            if let Err(e) = unsafe { kernel32::close_handle(self.handle) } {
                debug!("Closing handle failed: {}", e);
            }
        }
    }
}

// A HANDLE is an opaque kernel object reference, usable from any thread
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}
