//! Engine-level error types.

use std::fmt;

use adapters::AdapterError;
use thiserror::Error;

use crate::machine::State;

/// One side of the FinishUpdate fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    StatusWrite,
    Invalidate,
    Notify,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusWrite => f.write_str("status write"),
            Self::Invalidate => f.write_str("cache invalidation"),
            Self::Notify => f.write_str("notification"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchFailure {
    pub branch: Branch,
    pub error: AdapterError,
}

fn describe(failures: &[BranchFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.branch, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors produced by the reconciler.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Input errors ------

    /// The trigger payload is missing a required field.
    #[error("invalid workflow input: {0}")]
    InvalidInput(String),

    // ------ State errors ------

    /// A state without a retry policy failed.
    #[error("state '{state}' failed: {source}")]
    StateFailed { state: State, source: AdapterError },

    /// A collaborator reported a non-retryable error.
    #[error("state '{state}' failed fatally: {source}")]
    StateFatal { state: State, source: AdapterError },

    /// Every allowed attempt failed with a retryable error.
    #[error("state '{state}' exceeded retry limit after {attempts} attempts: {source}")]
    RetryExhausted {
        state: State,
        attempts: u32,
        source: AdapterError,
    },

    /// At least one FinishUpdate branch failed.
    #[error("{} fan-out branch(es) failed: {}", .failures.len(), describe(.failures))]
    FanOut { failures: Vec<BranchFailure> },

    // ------ Run outcome ------

    /// The run was routed to the Failure state.
    #[error("run failed after '{from}': {cause}")]
    Failed {
        from: State,
        cause: Box<EngineError>,
    },
}

impl EngineError {
    /// The state whose failure ended the run.
    pub fn failed_state(&self) -> Option<State> {
        match self {
            Self::InvalidInput(_) | Self::FanOut { .. } => None,
            Self::StateFailed { state, .. }
            | Self::StateFatal { state, .. }
            | Self::RetryExhausted { state, .. } => Some(*state),
            Self::Failed { from, .. } => Some(*from),
        }
    }
}
