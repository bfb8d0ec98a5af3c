//! Transport seam between a queue and its worker processes.

use std::fmt;
use std::time::Duration;

use jobhub_job_queue::TaskMessage;

use crate::error::BrokerError;

/// A named channel that carries task messages to workers.
///
/// Brokers only move messages; they know nothing about job bodies. Delivery
/// guarantees are broker specific and documented on each implementation.
pub trait Broker: Send + Sync + fmt::Debug {
    /// Name of the queue the broker feeds.
    fn name(&self) -> &str;

    /// Publish a message for a worker to pick up.
    fn push(&self, message: &TaskMessage) -> Result<(), BrokerError>;

    /// Take the oldest message, waiting up to `timeout` for one to arrive.
    fn pop(&self, timeout: Duration) -> Result<Option<TaskMessage>, BrokerError>;

    /// Number of messages waiting.
    fn pending(&self) -> Result<usize, BrokerError>;
}
