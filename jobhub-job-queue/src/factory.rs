//! Backend selection and the application's queue context.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::collector::JobCollector;
use crate::error::{QueueError, ServerError};
use crate::queue::{JobQueue, QueueOptions};
use crate::types::JobRegistration;

/// Which backend to build and the options handed to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Backend key; empty means no queue.
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub options: QueueOptions,
}

impl QueueConfig {
    pub fn new(backend: impl Into<String>, options: QueueOptions) -> Self {
        Self {
            backend: backend.into(),
            options,
        }
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        !self.backend.trim().is_empty()
    }
}

/// Builds a queue backend from its configuration and the job snapshot.
pub type BackendFactory =
    fn(&QueueConfig, &BTreeMap<String, JobRegistration>) -> Result<Arc<dyn JobQueue>, QueueError>;

/// Maps backend keys to their factories.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend. A later registration under the same key replaces the earlier one.
    pub fn register(&mut self, key: impl Into<String>, factory: BackendFactory) -> &mut Self {
        self.factories.insert(key.into(), factory);
        self
    }

    pub fn resolve(&self, key: &str) -> Result<BackendFactory, QueueError> {
        self.factories
            .get(key)
            .copied()
            .ok_or_else(|| QueueError::UnknownBackend(key.to_owned()))
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// Build the configured queue, or `None` when no backend is configured.
pub fn build_queue(
    config: &QueueConfig,
    collector: &JobCollector,
    backends: &BackendRegistry,
) -> Result<Option<Arc<dyn JobQueue>>, QueueError> {
    if !config.is_configured() {
        return Ok(None);
    }
    let factory = backends.resolve(config.backend.trim())?;
    let queue = factory(config, collector.jobs())?;
    Ok(Some(queue))
}

/// Outcome of queue construction.
#[derive(Debug, Clone)]
pub enum QueueState {
    /// No queue is available. `reason` holds the construction error, if any.
    NoQueue { reason: Option<String> },
    Active(Arc<dyn JobQueue>),
}

impl QueueState {
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

struct QueueContextInner {
    config: QueueConfig,
    collector: Arc<JobCollector>,
    backends: BackendRegistry,
    state: OnceCell<QueueState>,
}

/// Holds the application's job queue.
///
/// The queue is constructed at most once, either by an explicit
/// [`initialize`](Self::initialize) or lazily on first access. Cloning the
/// context shares the same queue.
#[derive(Clone)]
pub struct QueueContext {
    inner: Arc<QueueContextInner>,
}

impl fmt::Debug for QueueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueContext")
            .field("config", &self.inner.config)
            .field("jobs", &self.inner.collector.len())
            .field("backends", &self.inner.backends)
            .field("state", &self.inner.state.get())
            .finish()
    }
}

impl QueueContext {
    pub fn new(config: QueueConfig, collector: Arc<JobCollector>, backends: BackendRegistry) -> Self {
        Self {
            inner: Arc::new(QueueContextInner {
                config,
                collector,
                backends,
                state: OnceCell::new(),
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    #[inline]
    pub fn collector(&self) -> &Arc<JobCollector> {
        &self.inner.collector
    }

    /// Construct the queue now.
    ///
    /// A construction failure is returned to the caller and also recorded, so
    /// the context settles in the no-queue state and later calls to
    /// [`get_job_queue`](Self::get_job_queue) report it.
    pub fn initialize(&self) -> Result<(), QueueError> {
        let mut failure = None;
        self.inner.state.get_or_init(|| {
            let (state, error) = self.construct();
            failure = error;
            state
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Settle in the no-queue state without constructing a backend.
    ///
    /// `reason` is reported by [`get_job_queue`](Self::get_job_queue).
    /// Returns `false` if the state was already decided.
    pub fn mark_unavailable(&self, reason: impl Into<String>) -> bool {
        self.inner
            .state
            .set(QueueState::NoQueue {
                reason: Some(reason.into()),
            })
            .is_ok()
    }

    /// Current state, constructing the queue if that has not happened yet.
    pub fn state(&self) -> &QueueState {
        self.inner.state.get_or_init(|| self.construct().0)
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.inner.state.get().is_some()
    }

    /// Whether a queue backend is active.
    pub fn has_job_queue(&self) -> bool {
        self.state().is_active()
    }

    /// The active queue.
    pub fn get_job_queue(&self) -> Result<Arc<dyn JobQueue>, ServerError> {
        match self.state() {
            QueueState::Active(queue) => Ok(Arc::clone(queue)),
            QueueState::NoQueue { reason: None } => Err(ServerError::NoJobQueue),
            QueueState::NoQueue { reason: Some(reason) } => {
                Err(ServerError::JobQueueUnavailable(reason.clone()))
            }
        }
    }

    /// Discard the queue so the next access constructs a fresh one.
    ///
    /// Other clones of this context keep the previous queue.
    pub fn invalidate(&mut self) {
        self.inner = Arc::new(QueueContextInner {
            config: self.inner.config.clone(),
            collector: Arc::clone(&self.inner.collector),
            backends: self.inner.backends.clone(),
            state: OnceCell::new(),
        });
    }

    /// A fresh, uninitialized context using a different queue configuration.
    pub fn with_config(&self, config: QueueConfig) -> Self {
        Self::new(config, Arc::clone(&self.inner.collector), self.inner.backends.clone())
    }

    fn construct(&self) -> (QueueState, Option<QueueError>) {
        let inner = &self.inner;
        match build_queue(&inner.config, &inner.collector, &inner.backends) {
            Ok(Some(queue)) => {
                tracing::info!(
                    backend = queue.backend(),
                    jobs = inner.collector.len(),
                    "job queue initialized"
                );
                (QueueState::Active(queue), None)
            }
            Ok(None) => {
                tracing::debug!("no job queue configured");
                (QueueState::NoQueue { reason: None }, None)
            }
            Err(e) => {
                let reason = e.to_string();
                (QueueState::NoQueue { reason: Some(reason) }, Some(e))
            }
        }
    }
}
