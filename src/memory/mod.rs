//! Typed access to values inside the target process
//!
//! This module provides:
//! - Offset chains and their resolution into live addresses
//! - Fixed-width value encodings
//! - The registry mapping value types to handle factories
//! - Typed handles and the set of handles refreshed by the ticker

pub mod active;
pub mod codec;
pub mod handle;
pub mod offset;
pub mod registry;

pub use active::{ActiveMemory, ActiveMemorySet, TickReport};
pub use codec::MemoryType;
pub use handle::{Memory, MemoryBinding};
pub use offset::{describe, Anchor, ChainResolver, OffsetChain};
pub use registry::{AccessorDescriptor, MemoryFactory, MemoryTypeRegistry, RegistryBuilder};
