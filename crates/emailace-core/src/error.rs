//! Error types for the core library.

use emailace_api::TransportError;
use thiserror::Error;

/// Failures of the draft-reply workflow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// The backend could not draft a reply.
    #[error("Failed to generate reply: {0}")]
    Generation(TransportError),

    /// The backend did not accept the reply.
    #[error("Failed to send reply: {0}")]
    Send(TransportError),

    /// The action is not allowed in the session's current phase.
    #[error("Cannot {action} while {phase}")]
    InvalidTransition {
        /// Phase the session was in.
        phase: &'static str,
        /// Action that was attempted.
        action: &'static str,
    },
}

impl WorkflowError {
    /// The underlying transport failure, if any.
    #[must_use]
    pub const fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Generation(error) | Self::Send(error) => Some(error),
            Self::InvalidTransition { .. } => None,
        }
    }
}

/// Result type alias for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;
