//! Session phase machine
//!
//! The orchestrator moves through these phases once per loop iteration.
//! Every move goes through [`validate_transition`], so a loop that tries
//! to execute after terminating fails loudly instead of talking to a
//! closed transport.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};

/// Orchestrator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Constructed, loop not started
    Idle,
    /// Between turns
    Running,
    /// An interrupt proposal is waiting for a yes/no
    InterruptPending,
    /// The menu is waiting for a selection
    Choosing,
    /// A unit is running
    Executing,
    /// Loop finished
    Terminated,
}

impl SessionPhase {
    /// No transitions leave this phase
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Validates a phase transition.
///
/// # Errors
/// `SessionError::IllegalTransition` if `to` is not reachable from `from`.
pub fn validate_transition(from: SessionPhase, to: SessionPhase) -> Result<(), SessionError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(SessionError::IllegalTransition { from, to })
    }
}

/// Phases reachable from `from` in one move
#[must_use]
pub fn allowed_transitions(from: SessionPhase) -> Vec<SessionPhase> {
    use SessionPhase::*;
    match from {
        Idle => vec![Running],
        Running => vec![InterruptPending, Choosing, Terminated],
        InterruptPending => vec![Executing, Choosing, Running, Terminated],
        Choosing => vec![Executing, Running, Terminated],
        Executing => vec![Running, Terminated],
        Terminated => vec![],
    }
}

fn allowed(from: SessionPhase, to: SessionPhase) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

/// Current phase plus guarded moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTracker {
    phase: SessionPhase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
        }
    }
}

impl PhaseTracker {
    /// Start in [`SessionPhase::Idle`]
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Move to `to` if allowed
    ///
    /// # Errors
    /// `SessionError::IllegalTransition`; the phase is unchanged.
    pub fn advance(&mut self, to: SessionPhase) -> Result<(), SessionError> {
        validate_transition(self.phase, to)?;
        tracing::trace!(from = ?self.phase, ?to, "phase transition");
        self.phase = to;
        Ok(())
    }
}
