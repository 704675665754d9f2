//! Windows API bindings
//!
//! Thin safe wrappers over the FFI calls the native backend needs.

pub mod kernel32;
pub mod psapi;
