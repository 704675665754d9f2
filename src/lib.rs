//! Typed, pointer-chained access to the memory of a running external process
//!
//! The [`InjectionService`] attaches to exactly one target process, resolves
//! offset chains into live addresses and hands out typed [`Memory`] handles.
//! Two background loops keep it consistent while the target comes and goes:
//! a watcher that detects exit and reattaches, and a ticker that refreshes
//! every active handle.

pub mod config;
pub mod core;
pub mod memory;
pub mod offsets;
pub mod process;
pub mod service;
#[cfg(windows)]
pub mod windows;

// Re-export main types from core module
pub use core::types::{
    Address, AttachError, Color, MemoryError, MemoryResult, ProcessId, ProcessInfo, Quaternion,
    ServiceState, Vector,
};

pub use memory::{Memory, MemoryType, MemoryTypeRegistry, OffsetChain};
pub use process::{ProcessHandle, ProcessLocator, ProcessSelector};
pub use service::InjectionService;

// Re-export core directly for full access
pub use core::*;
