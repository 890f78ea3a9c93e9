//! Engine lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Lifecycle of one engine instance.
///
/// `installing → installed → activating → active`; any state may end in
/// `redundant` (failed install or superseded by a newer epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

impl WorkerState {
    /// Move to `to`, rejecting out-of-order transitions.
    pub fn transition(self, to: WorkerState) -> Result<WorkerState, Error> {
        use WorkerState::*;
        let allowed = matches!(
            (self, to),
            (Installing, Installed)
                | (Installed, Activating)
                | (Activating, Active)
                | (Installing | Installed | Activating | Active, Redundant)
        );
        if allowed { Ok(to) } else { Err(Error::InvalidState(format!("{self} -> {to}"))) }
    }

    /// Only an active engine handles fetch events.
    pub fn can_intercept(self) -> bool {
        self == WorkerState::Active
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}
