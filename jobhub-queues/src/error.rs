//! Transport errors raised by brokers.

use jobhub_job_queue::QueueError;
use thiserror::Error;

/// Errors that may occur while talking to a broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("malformed task message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("broker is closed")]
    Closed,
}

impl From<BrokerError> for QueueError {
    fn from(err: BrokerError) -> Self {
        QueueError::Backend(err.to_string())
    }
}
