//! Core type definitions for Memory-Injection
//!
//! This module contains the fundamental types used throughout the crate,
//! including addresses, process information, service states and errors.

mod address;
mod error;
mod process_info;
mod state;
mod value;

// Re-export all public types
pub use address::{parse_hex, Address};
pub use error::{AttachError, MemoryError, MemoryResult};
pub use process_info::{ModuleInfo, ProcessArchitecture, ProcessInfo};
pub use state::ServiceState;
pub use value::{Color, Quaternion, Vector};

// Common type aliases
pub type ProcessId = u32;
