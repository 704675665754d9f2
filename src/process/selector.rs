//! Choosing the target process

use crate::core::types::{ProcessId, ProcessInfo};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How to pick the target out of the running processes.
///
/// Name matching is case-insensitive and ignores a trailing `.exe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessSelector {
    NameContains(String),
    NameEquals(String),
    Pid(ProcessId),
}

impl ProcessSelector {
    pub fn name_contains(text: impl Into<String>) -> Self {
        ProcessSelector::NameContains(text.into())
    }

    pub fn name_equals(text: impl Into<String>) -> Self {
        ProcessSelector::NameEquals(text.into())
    }

    /// Whether `info` is a candidate for this selector
    pub fn matches(&self, info: &ProcessInfo) -> bool {
        match self {
            ProcessSelector::NameContains(text) => {
                normalize(&info.name).contains(&text.to_lowercase())
            }
            ProcessSelector::NameEquals(text) => normalize(&info.name) == normalize(text),
            ProcessSelector::Pid(pid) => info.pid == *pid,
        }
    }
}

fn normalize(name: &str) -> String {
    let lower = name.to_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

impl fmt::Display for ProcessSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessSelector::NameContains(text) => write!(f, "name contains {text:?}"),
            ProcessSelector::NameEquals(text) => write!(f, "name equals {text:?}"),
            ProcessSelector::Pid(pid) => write!(f, "pid {pid}"),
        }
    }
}
