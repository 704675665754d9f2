//! Native Windows backend
//!
//! Implements the process contract on top of ToolHelp32, `OpenProcess` and
//! `Read/WriteProcessMemory`. All unsafe FFI calls are contained within
//! this module.

pub mod bindings;
pub mod enumerator;
pub mod process;
pub mod types;
pub mod utils;

pub use enumerator::{enumerate_processes, ProcessEnumerator};
pub use process::{WindowsProcess, WindowsProcessLocator};
pub use types::Handle;
