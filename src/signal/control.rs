//! Orchestrator control messages.

use std::fmt;

/// Toggles fault injection at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Route events to the configured explore policy.
    EnableOrchestration,
    /// Route events to the passthrough policy.
    DisableOrchestration,
}

impl Control {
    /// Parses the `op` query value of the REST control route.
    pub fn from_op(op: &str) -> Option<Self> {
        match op {
            "enableOrchestration" => Some(Control::EnableOrchestration),
            "disableOrchestration" => Some(Control::DisableOrchestration),
            _ => None,
        }
    }

    /// Wire value of the `op` query parameter.
    pub fn as_op(&self) -> &'static str {
        match self {
            Control::EnableOrchestration => "enableOrchestration",
            Control::DisableOrchestration => "disableOrchestration",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_op())
    }
}
