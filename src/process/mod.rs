//! Process attachment and raw memory access
//!
//! This module defines the [`ProcessHandle`] contract, the [`ProcessLocator`]
//! used to find and open the target, the selector deciding which process is
//! the target, and the retrying attacher. Backends: a simulated in-memory
//! process everywhere, and the native backend on Windows.

pub mod handle;
pub mod manager;
pub mod selector;
pub mod simulated;

pub use handle::{ProcessHandle, ProcessLocator, SharedProcess};
pub use manager::{attach, AttachBackoff, ProcessAttacher};
pub use selector::ProcessSelector;
pub use simulated::{SimulatedProcess, SimulatedSystem};

#[cfg(windows)]
pub use crate::windows::{WindowsProcess, WindowsProcessLocator};

/// The native locator for this platform, if there is one
#[cfg(windows)]
pub fn native_locator() -> Option<std::sync::Arc<dyn ProcessLocator>> {
    Some(std::sync::Arc::new(WindowsProcessLocator::new()))
}

/// The native locator for this platform, if there is one
#[cfg(not(windows))]
pub fn native_locator() -> Option<std::sync::Arc<dyn ProcessLocator>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_locator_availability() {
        assert_eq!(native_locator().is_some(), cfg!(windows));
    }
}
