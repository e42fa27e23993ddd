//! Error types for leadscout
//!
//! Pipeline failures are categorized by what they mean for the candidate:
//! - `TransientNetwork`: retryable; candidate stays off the ledger
//! - `InvalidCandidate`: retrying cannot help; candidate is rejected and ledgered
//! - `ExternalServiceUnavailable`: classifier down; breaker trips, candidate stays off the ledger
//! - `Persistence`: disk write failed; prior durable state is intact

use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network failure or timeout talking to an external service
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Candidate lacks data required for imagery (e.g. no coordinate)
    #[error("Invalid candidate: {0}")]
    InvalidCandidate(String),

    /// Vision inference endpoint unreachable
    #[error("External service unavailable: {0}")]
    ExternalServiceUnavailable(String),

    /// Lead store or image write failed
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error from the common crate
    #[error("Common error: {0}")]
    Common(#[from] leadscout_common::Error),
}

impl PipelineError {
    /// Whether the candidate should be retried on the next run
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::TransientNetwork(_)
                | PipelineError::ExternalServiceUnavailable(_)
                | PipelineError::Persistence(_)
                | PipelineError::Io(_)
        )
    }
}

impl From<crate::services::StoreError> for PipelineError {
    fn from(error: crate::services::StoreError) -> Self {
        match error {
            crate::services::StoreError::Io(e) => PipelineError::Io(e),
            other => PipelineError::Persistence(other.to_string()),
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
