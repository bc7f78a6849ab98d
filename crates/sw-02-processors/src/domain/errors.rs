//! # Processor Errors

use sw_01_state_backend::StateError;
use thiserror::Error;

/// Errors raised by the processors.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Storage failure. Fatal for the job.
    #[error("State backend error: {0}")]
    State(#[from] StateError),

    /// One key function is needed per input ordinal.
    #[error("Got {key_fns} key functions for an operation of arity {arity}")]
    ArityMismatch { key_fns: usize, arity: usize },

    #[error("Ordinal {ordinal} out of range for arity {arity}")]
    UnknownOrdinal { ordinal: usize, arity: usize },

    /// Two-stage wiring was requested for an operation without a combine function.
    #[error("Aggregate operation has no combine function")]
    MissingCombine,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for processor operations
pub type ProcessorResult<T> = Result<T, ProcessorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_error_converts() {
        let err: ProcessorError = StateError::Closed.into();
        assert!(matches!(err, ProcessorError::State(StateError::Closed)));
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_arity_mismatch_display() {
        let err = ProcessorError::ArityMismatch {
            key_fns: 1,
            arity: 2,
        };
        assert_eq!(
            err.to_string(),
            "Got 1 key functions for an operation of arity 2"
        );
    }
}
