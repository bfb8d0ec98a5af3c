//! Worker loop draining a queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::queue::{TaskOutcome, TaskSource};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pulls tasks from a [`TaskSource`] and executes them until told to stop.
pub struct Consumer<'a> {
    source: &'a dyn TaskSource,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl<'a> Consumer<'a> {
    pub fn new(source: &'a dyn TaskSource) -> Self {
        Self {
            source,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// How long a single wait for a task may block.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Share an externally owned shutdown flag.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Flag that stops [`run`](Self::run) once set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Process tasks until shutdown is requested. Returns the number processed.
    pub fn run(&self) -> usize {
        let mut processed = 0;
        tracing::info!(poll_interval = ?self.poll_interval, "consumer started");

        while !self.shutdown.load(Ordering::Acquire) {
            match self.source.process_next(self.poll_interval) {
                Ok(Some(outcome)) => {
                    processed += 1;
                    log_outcome(&outcome);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "failed to fetch task, backing off");
                    thread::sleep(self.poll_interval);
                }
            }
        }

        tracing::info!(processed, "consumer stopped");
        processed
    }

    /// Process tasks until none is waiting. Returns the number processed.
    pub fn drain(&self) -> usize {
        let mut processed = 0;
        loop {
            match self.source.process_next(Duration::ZERO) {
                Ok(Some(outcome)) => {
                    processed += 1;
                    log_outcome(&outcome);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to fetch task while draining");
                    break;
                }
            }
        }
        processed
    }
}

fn log_outcome(outcome: &TaskOutcome) {
    match outcome {
        TaskOutcome::Completed { id, name } => {
            tracing::debug!(task_id = %id, job = %name, "consumer finished task")
        }
        TaskOutcome::Failed { id, name, error } => {
            tracing::warn!(task_id = %id, job = %name, %error, "consumer task failed")
        }
        TaskOutcome::Unknown { id, name } => {
            tracing::warn!(task_id = %id, job = %name, "consumer dropped task for unknown job")
        }
    }
}
