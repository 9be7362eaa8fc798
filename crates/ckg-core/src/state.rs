//! Synthesis attempt states
//!
//! One attempt walks Generating -> SyntaxCheck -> Compiling -> Testing and
//! ends Accepted, or falls into Retry. Retry either starts the next round
//! or, once the round budget is spent, ends Abandoned.

use serde::{Deserialize, Serialize};

use crate::error::SynthesisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Generating,
    SyntaxCheck,
    Compiling,
    /// Asking the oracle to fix a compile failure
    Repairing,
    Testing,
    Retry,
    Accepted,
    Abandoned,
}

impl AttemptState {
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Abandoned)
    }
}

#[must_use]
pub fn allowed_transitions(from: AttemptState) -> Vec<AttemptState> {
    use AttemptState::*;
    match from {
        Generating => vec![SyntaxCheck, Retry],
        SyntaxCheck => vec![Compiling, Retry],
        Compiling => vec![Testing, Repairing, Retry],
        Repairing => vec![Compiling, Retry],
        Testing => vec![Accepted, Retry],
        Retry => vec![Generating, Abandoned],
        Accepted | Abandoned => vec![],
    }
}

pub fn validate_transition(from: AttemptState, to: AttemptState) -> Result<(), SynthesisError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(SynthesisError::IllegalTransition { from, to })
    }
}

/// Current state of one attempt, advanced only through checked transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptMachine {
    state: AttemptState,
}

impl AttemptMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AttemptState::Generating,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn advance(&mut self, to: AttemptState) -> Result<(), SynthesisError> {
        validate_transition(self.state, to)?;
        tracing::trace!("Attempt {:?} -> {:?}", self.state, to);
        self.state = to;
        Ok(())
    }
}

impl Default for AttemptMachine {
    fn default() -> Self {
        Self::new()
    }
}
