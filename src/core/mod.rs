//! Core module containing fundamental types for Memory-Injection
//!
//! This module provides the foundational building blocks used throughout
//! the crate: address handling, process information, lifecycle states, the
//! error taxonomy and the cooperative shutdown signal.

pub mod shutdown;
pub mod types;

pub use shutdown::ShutdownSignal;

// Re-export commonly used types for convenience
pub use types::{
    Address, AttachError, MemoryError, MemoryResult, ProcessInfo, ServiceState,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
