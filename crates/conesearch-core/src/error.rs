use thiserror::Error;

use crate::domain::{ExecutionPhase, JobId};

/// Errors returned by job lifecycle operations.
///
/// A failed operation never leaves a partially applied change behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UwsError {
    /// Malformed create/update input, rejected before any state change.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("job not found: {0}")]
    NotFound(JobId),

    /// Update incompatible with the job's current phase.
    #[error("conflict on {id}: {reason}")]
    Conflict { id: JobId, reason: String },

    #[error("invalid phase transition {from} -> {to}")]
    InvalidTransition {
        from: ExecutionPhase,
        to: ExecutionPhase,
    },
}

impl UwsError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
