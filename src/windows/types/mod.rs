//! Windows-specific owned types

pub mod handle;

pub use handle::Handle;
