use std::sync::{Arc, PoisonError, RwLock};

use jobhub_job_queue::{JobArgs, JobKwargs, JobQueue, QueueConfig, QueueContext, QueueError, ServerError, WrappedJob};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<jobhub_config::Config>,
    // Arc-wrapped RwLock so the queue context can be swapped for every clone at once.
    queue: Arc<RwLock<QueueContext>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("queue", &self.queue_context())
            .finish()
    }
}

impl AppState {
    pub fn new(config: jobhub_config::Config, queue: QueueContext) -> Self {
        Self {
            config: Arc::new(config),
            queue: Arc::new(RwLock::new(queue)),
        }
    }

    /// Atomically get a clone of the current queue context.
    pub fn queue_context(&self) -> QueueContext {
        let guard = self.queue.read().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    /// Replace the queue with one built from `config`, returning the previous context.
    ///
    /// Construction failures are handled like at startup: logged, leaving no queue.
    pub fn swap_queue_config(&self, config: QueueConfig) -> QueueContext {
        let new = self.queue_context().with_config(config);
        crate::app::initialize_or_degrade(&new);
        let mut guard = self.queue.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, new)
    }

    pub fn has_job_queue(&self) -> bool {
        self.queue_context().has_job_queue()
    }

    pub fn get_job_queue(&self) -> Result<Arc<dyn JobQueue>, ServerError> {
        self.queue_context().get_job_queue()
    }

    pub fn wrap_job(&self, name: &str, synchronous: bool) -> Result<WrappedJob, QueueError> {
        self.queue_context().wrap_job(name, synchronous)
    }

    /// Enqueue `name` on the active queue.
    ///
    /// Fails with [`ServerError`] (wrapped in `anyhow`) when no queue is
    /// available and with [`QueueError`] when the queue rejects the job.
    pub fn enqueue(&self, name: &str, args: JobArgs, kwargs: JobKwargs) -> anyhow::Result<()> {
        let queue = self.get_job_queue()?;
        queue.enqueue(name, args, kwargs)?;
        Ok(())
    }
}
