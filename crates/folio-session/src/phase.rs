//! Publish protocol phases
//!
//! One publish walks `Idle -> Collecting -> Creating -> Rewriting ->
//! Saving -> Clearing -> Idle`. `Failed` absorbs from the two network
//! phases; an empty dirty set short-circuits `Collecting -> Idle`.

use serde::{Deserialize, Serialize};

/// Phase of the publish state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishPhase {
    /// No publish in progress.
    Idle,
    /// Snapshotting the dirty set and running preflight checks.
    Collecting,
    /// Batch-create in flight for virtual documents.
    Creating,
    /// Rewriting virtual references through the id map. Local only.
    Rewriting,
    /// Batch-save in flight for updated documents.
    Saving,
    /// Clearing pending changes against the snapshot.
    Clearing,
    /// A network phase failed; pending state is intact for retry.
    Failed,
}

impl PublishPhase {
    /// Lowercase phase name for logs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
            Self::Creating => "creating",
            Self::Rewriting => "rewriting",
            Self::Saving => "saving",
            Self::Clearing => "clearing",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PublishPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A phase move outside the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal publish phase transition: {from} -> {to}")]
pub struct IllegalTransition {
    /// Phase the machine was in.
    pub from: PublishPhase,
    /// Phase that was requested.
    pub to: PublishPhase,
}

/// Phases reachable in one step from `from`.
#[must_use]
pub fn allowed_transitions(from: PublishPhase) -> Vec<PublishPhase> {
    use PublishPhase::{Clearing, Collecting, Creating, Failed, Idle, Rewriting, Saving};
    match from {
        Idle => vec![Collecting],
        Collecting => vec![Creating, Idle],
        Creating => vec![Rewriting, Failed],
        Rewriting => vec![Saving],
        Saving => vec![Clearing, Failed],
        Clearing => vec![Idle],
        Failed => vec![Idle],
    }
}

/// Validates a phase transition.
pub fn validate_transition(from: PublishPhase, to: PublishPhase) -> Result<(), IllegalTransition> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

fn allowed(from: PublishPhase, to: PublishPhase) -> bool {
    allowed_transitions(from).into_iter().any(|phase| phase == to)
}

/// Tracks the current phase of one publish run.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    current: PublishPhase,
}

impl PhaseMachine {
    /// New machine, idle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: PublishPhase::Idle,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn current(&self) -> PublishPhase {
        self.current
    }

    /// Move to `to`, validating the step.
    pub fn advance(&mut self, to: PublishPhase) -> Result<(), IllegalTransition> {
        validate_transition(self.current, to)?;
        self.current = to;
        Ok(())
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}
