//! Lifecycle states of the injection service

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the injection service is in its attach/detach lifecycle.
///
/// `Uninitialized -> Attaching -> Attached -> (Detached -> Attaching)* -> ShuttingDown -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Uninitialized,
    Attaching,
    Attached,
    Detached,
    ShuttingDown,
    Stopped,
}

impl ServiceState {
    /// Whether address resolution and typed handles may be used in this state
    pub fn is_ready(&self) -> bool {
        matches!(self, ServiceState::Attached)
    }

    /// Checks a transition against the lifecycle graph
    pub fn can_transition_to(&self, next: ServiceState) -> bool {
        use ServiceState::*;

        match (self, next) {
            (Stopped, _) => false,
            (ShuttingDown, Stopped) => true,
            (ShuttingDown, _) => false,
            (_, ShuttingDown) => true,
            (Uninitialized, Attaching) => true,
            (Attaching, Attached) => true,
            (Attached, Detached) => true,
            (Detached, Attaching) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::Attaching => "attaching",
            ServiceState::Attached => "attached",
            ServiceState::Detached => "detached",
            ServiceState::ShuttingDown => "shutting down",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
