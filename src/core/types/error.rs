//! Custom error types for Memory-Injection

use super::state::ServiceState;
use std::fmt;
use thiserror::Error;

/// Why attaching to the target process failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttachError {
    #[error("No process matches {selector}")]
    NotFound { selector: String },

    #[error("{count} processes match {selector}: {pids:?}")]
    Ambiguous {
        selector: String,
        count: usize,
        pids: Vec<u32>,
    },
}

/// Main error type for memory operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Attachment failed: {0}")]
    Attachment(#[from] AttachError),

    #[error("Failed to open process {pid}: {reason}")]
    OpenFailed { pid: u32, reason: String },

    #[error("Failed to read memory at {address}: {reason}")]
    ReadFailed { address: String, reason: String },

    #[error("Failed to write memory at {address}: {reason}")]
    WriteFailed { address: String, reason: String },

    #[error("Pointer chain broken at step {step} ({address}): {reason}")]
    UnresolvedPointer {
        step: usize,
        address: String,
        reason: String,
    },

    #[error("No memory accessor for type: {0}")]
    UnsupportedType(&'static str),

    #[error("Duplicate memory accessor for type: {0}")]
    DuplicateAccessor(&'static str),

    #[error("Process not ready (service is {0})")]
    ProcessNotReady(ServiceState),

    #[error("Invalid offset chain: {0}")]
    InvalidChain(String),

    #[error("No offset named: {0}")]
    OffsetNotFound(String),

    #[error("Invalid offset value: {0}")]
    InvalidOffset(String),

    #[error("No offset file could be loaded")]
    NoOffsetFile,

    #[error("Process {0} has exited")]
    ProcessExited(u32),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[cfg(windows)]
    #[error("Windows API: {0}")]
    WindowsApi(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

impl MemoryError {
    /// Creates a read failed error
    pub fn read_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::ReadFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a write failed error
    pub fn write_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::WriteFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an unresolved pointer error for the given chain step
    pub fn unresolved_pointer(
        step: usize,
        address: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        MemoryError::UnresolvedPointer {
            step,
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// True if retrying later might succeed without changing the request
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MemoryError::Attachment(_)
                | MemoryError::OpenFailed { .. }
                | MemoryError::ProcessNotReady(_)
                | MemoryError::ProcessExited(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MemoryError::read_failed("0xDEADBEEF", "unmapped");
        assert_eq!(
            err.to_string(),
            "Failed to read memory at 0xDEADBEEF: unmapped"
        );

        let err = MemoryError::ProcessNotReady(ServiceState::Detached);
        assert_eq!(err.to_string(), "Process not ready (service is detached)");
    }

    #[test]
    fn test_attach_error_display() {
        let err = AttachError::NotFound {
            selector: "name contains \"game\"".to_string(),
        };
        assert_eq!(err.to_string(), "No process matches name contains \"game\"");

        let err = AttachError::Ambiguous {
            selector: "name contains \"game\"".to_string(),
            count: 2,
            pids: vec![10, 11],
        };
        assert_eq!(
            err.to_string(),
            "2 processes match name contains \"game\": [10, 11]"
        );

        let wrapped: MemoryError = err.into();
        assert!(matches!(
            wrapped,
            MemoryError::Attachment(AttachError::Ambiguous { count: 2, .. })
        ));
    }

    #[test]
    fn test_helper_methods() {
        match MemoryError::unresolved_pointer(2, "0x0000000000001000", "unmapped") {
            MemoryError::UnresolvedPointer {
                step,
                address,
                reason,
            } => {
                assert_eq!(step, 2);
                assert_eq!(address, "0x0000000000001000");
                assert_eq!(reason, "unmapped");
            }
            other => panic!("Wrong error type: {other:?}"),
        }

        match MemoryError::write_failed("0xDEAD", "protected memory") {
            MemoryError::WriteFailed { address, reason } => {
                assert_eq!(address, "0xDEAD");
                assert_eq!(reason, "protected memory");
            }
            other => panic!("Wrong error type: {other:?}"),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(MemoryError::ProcessNotReady(ServiceState::Attaching).is_transient());
        assert!(MemoryError::ProcessExited(42).is_transient());
        assert!(!MemoryError::InvalidChain("empty".to_string()).is_transient());
        assert!(!MemoryError::UnsupportedType("String").is_transient());
        assert!(!MemoryError::unresolved_pointer(0, "0x0", "null").is_transient());
    }

    #[test]
    fn test_from_implementations() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let mem_err: MemoryError = io_err.into();
        assert!(matches!(mem_err, MemoryError::IoError(_)));

        let json_err = serde_json::from_str::<String>("invalid json").unwrap_err();
        let mem_err: MemoryError = json_err.into();
        assert!(matches!(mem_err, MemoryError::JsonError(_)));
    }
}
