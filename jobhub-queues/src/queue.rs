//! Job queue dispatching through a [`Broker`].

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use jobhub_job_queue::{
    options_bool, register_all, JobArgs, JobKwargs, JobQueue, JobRegistration, QueueError, QueueOptions,
    TaskMessage,
};
use uuid::Uuid;

use crate::broker::Broker;

/// What happened to a message taken off the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed { id: Uuid, name: String },
    Failed { id: Uuid, name: String, error: String },
    /// No job of that name is registered with this queue.
    Unknown { id: Uuid, name: String },
}

/// Something a worker can pull tasks from.
pub trait TaskSource: Send + Sync {
    /// Take one message and execute it, waiting up to `timeout` for one.
    fn process_next(&self, timeout: Duration) -> Result<Option<TaskOutcome>, QueueError>;
}

/// Job queue backed by a message broker.
///
/// Each registered job becomes a broker task under its own name. Enqueued
/// calls are published as [`TaskMessage`]s and executed by workers.
///
/// In immediate mode (option `immediate = true`) nothing is published: the
/// job runs in the calling thread before `enqueue` returns. Results are never
/// stored.
#[derive(Debug)]
pub struct BrokerQueue<B: Broker> {
    backend: String,
    options: QueueOptions,
    immediate: bool,
    broker: B,
    jobs: RwLock<BTreeMap<String, JobRegistration>>,
}

impl<B: Broker + 'static> BrokerQueue<B> {
    /// Build the queue and register every job of the snapshot.
    pub fn new(
        backend: impl Into<String>,
        broker: B,
        options: QueueOptions,
        jobs: &BTreeMap<String, JobRegistration>,
    ) -> Result<Self, QueueError> {
        let immediate = options_bool(&options, "immediate")?.unwrap_or(false);
        let queue = Self {
            backend: backend.into(),
            options,
            immediate,
            broker,
            jobs: RwLock::new(BTreeMap::new()),
        };
        register_all(&queue, jobs.values())?;
        tracing::debug!(
            queue = queue.broker.name(),
            immediate,
            jobs = jobs.len(),
            "broker queue created"
        );
        Ok(queue)
    }

    /// Name of the queue on the broker.
    #[inline]
    pub fn name(&self) -> &str {
        self.broker.name()
    }

    #[inline]
    pub fn broker(&self) -> &B {
        &self.broker
    }

    #[inline]
    pub fn immediate(&self) -> bool {
        self.immediate
    }

    /// Always `false`: job results are discarded.
    #[inline]
    pub fn store_results(&self) -> bool {
        false
    }

    fn lookup(&self, name: &str) -> Option<JobRegistration> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(name).cloned()
    }

    /// Execute a message taken off the broker.
    pub fn execute(&self, message: TaskMessage) -> TaskOutcome {
        let TaskMessage {
            id, name, args, kwargs, ..
        } = message;

        let Some(registration) = self.lookup(&name) else {
            tracing::warn!(task_id = %id, job = %name, "received task for unknown job");
            return TaskOutcome::Unknown { id, name };
        };

        match registration.invoke(args, kwargs) {
            Ok(_) => {
                tracing::info!(task_id = %id, job = %name, "task completed");
                TaskOutcome::Completed { id, name }
            }
            Err(e) => {
                tracing::error!(task_id = %id, job = %name, error = %e, "task failed");
                TaskOutcome::Failed {
                    id,
                    name,
                    error: e.to_string(),
                }
            }
        }
    }
}

impl<B: Broker + 'static> TaskSource for BrokerQueue<B> {
    fn process_next(&self, timeout: Duration) -> Result<Option<TaskOutcome>, QueueError> {
        let message = self.broker.pop(timeout)?;
        Ok(message.map(|m| self.execute(m)))
    }
}

impl<B: Broker + 'static> JobQueue for BrokerQueue<B> {
    fn backend(&self) -> &str {
        &self.backend
    }

    fn options(&self) -> &QueueOptions {
        &self.options
    }

    fn jobs(&self) -> Vec<String> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.keys().cloned().collect()
    }

    fn register(&self, registration: JobRegistration) -> Result<(), QueueError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(registration.name()) {
            return Err(QueueError::JobExists(registration.name().to_owned()));
        }
        jobs.insert(registration.name().to_owned(), registration);
        Ok(())
    }

    fn enqueue(&self, name: &str, args: JobArgs, kwargs: JobKwargs) -> Result<(), QueueError> {
        let registration = self
            .lookup(name)
            .ok_or_else(|| QueueError::UnknownJob(name.to_owned()))?;

        if self.immediate {
            match registration.invoke(args, kwargs) {
                Ok(_) => tracing::debug!(job = name, "job ran in immediate mode, result discarded"),
                Err(e) => tracing::error!(job = name, error = %e, "job failed in immediate mode"),
            }
            return Ok(());
        }

        let message = TaskMessage::new(name, args, kwargs);
        self.broker.push(&message)?;
        tracing::debug!(task_id = %message.id, job = name, queue = self.broker.name(), "job enqueued");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
