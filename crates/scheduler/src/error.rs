//! Scheduler error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A schedule expression could not be parsed.
    #[error("invalid schedule expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    /// No schedule expressions were supplied.
    #[error("at least one schedule expression is required")]
    NoSchedules,
}

/// Why a run could not be started. Distinct from a run that started and
/// then failed, which is reported as [`crate::target::RunResult::Failed`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// The target was unreachable or overloaded; worth another attempt.
    #[error("transient invocation failure: {0}")]
    Transient(String),

    /// The target refused the trigger (e.g. malformed payload).
    #[error("invocation rejected: {0}")]
    Rejected(String),
}

impl InvocationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
