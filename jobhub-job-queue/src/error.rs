//! Error types for the job queue system.

use thiserror::Error;

/// Raised when two job bodies register under the same name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job {name:?} is already registered")]
pub struct DuplicateJobError {
    pub name: String,
}

impl DuplicateJobError {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Errors raised by a job body while executing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("job failed: {0}")]
    Failed(String),
}

/// Errors that may occur while interacting with a job queue backend.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("unknown job: {0:?}")]
    UnknownJob(String),

    #[error("job {0:?} already exists")]
    JobExists(String),

    #[error("unknown job queue backend: {0:?}")]
    UnknownBackend(String),

    #[error("invalid job queue configuration: {0}")]
    Configuration(String),

    #[error("job queue backend error: {0}")]
    Backend(String),

    #[error("job {name:?} failed: {source}")]
    Execution {
        name: String,
        #[source]
        source: JobError,
    },

    #[error(transparent)]
    Duplicate(#[from] DuplicateJobError),
}

/// Application-level errors surfaced to callers that require a queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    #[error("the application is not configured to use a job queue")]
    NoJobQueue,

    #[error("the configured job queue could not be created: {0}")]
    JobQueueUnavailable(String),
}
