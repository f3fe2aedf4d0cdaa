//! Job error types.

use crate::job::{JobId, JobStatus};
use kiln_core::KilnError;
use thiserror::Error;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Job-related errors.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job not found.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// The requested transition would break the job state machine.
    #[error("Invalid job state: job {job_id} cannot move from {from} to {to}")]
    InvalidState {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    /// Scheduler lifecycle misuse.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl JobError {
    /// Creates an invalid-transition error.
    #[must_use]
    pub fn invalid_transition(job_id: &JobId, from: JobStatus, to: JobStatus) -> Self {
        Self::InvalidState {
            job_id: job_id.clone(),
            from,
            to,
        }
    }

    /// Returns true if the caller asked for something impossible.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, JobError::NotFound(_) | JobError::InvalidState { .. })
    }
}

impl From<JobError> for KilnError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(id) => KilnError::not_found("Job", id),
            e @ JobError::InvalidState { .. } => KilnError::InvalidState(e.to_string()),
            JobError::Scheduler(msg) => KilnError::Internal(msg),
            JobError::Serialization(e) => KilnError::from(e),
        }
    }
}
