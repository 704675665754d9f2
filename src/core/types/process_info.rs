//! Process information types

use super::{Address, ProcessId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A running process as seen by a locator, before it is opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub name: String,
    pub path: Option<PathBuf>,
    pub architecture: ProcessArchitecture,
}

impl ProcessInfo {
    /// Creates a new ProcessInfo with minimal information
    pub fn new(pid: ProcessId, name: impl Into<String>) -> Self {
        ProcessInfo {
            pid,
            name: name.into(),
            path: None,
            architecture: ProcessArchitecture::Unknown,
        }
    }

    /// Sets the architecture
    pub fn with_architecture(mut self, architecture: ProcessArchitecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// Sets the executable path
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Process architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessArchitecture {
    X86,
    X64,
    Unknown,
}

impl ProcessArchitecture {
    /// Returns the pointer size for this architecture
    pub fn pointer_size(&self) -> usize {
        match self {
            ProcessArchitecture::X86 => 4,
            ProcessArchitecture::X64 | ProcessArchitecture::Unknown => 8,
        }
    }
}

/// The primary executable module of an attached process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub base_address: Address,
    pub size: u64,
}

impl ModuleInfo {
    /// Creates a new ModuleInfo
    pub fn new(name: impl Into<String>, base_address: Address, size: u64) -> Self {
        ModuleInfo {
            name: name.into(),
            base_address,
            size,
        }
    }
}
