//! Factories for the built-in queue backends.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use jobhub_job_queue::{
    options_str, BackendRegistry, JobQueue, JobRegistration, QueueConfig, QueueError,
};

use crate::memory::MemoryBroker;
use crate::queue::{BrokerQueue, TaskSource};
use crate::redis_broker::RedisBroker;

/// Backend key of the Redis-backed queue.
pub const REDIS_BACKEND: &str = "redis";
/// Backend key of the in-process queue.
pub const MEMORY_BACKEND: &str = "memory";

pub const DEFAULT_QUEUE_NAME: &str = "jobhub";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";

/// Register every backend shipped with this crate.
pub fn register_builtin_backends(registry: &mut BackendRegistry) {
    registry
        .register(REDIS_BACKEND, redis_backend)
        .register(MEMORY_BACKEND, memory_backend);
}

/// Registry containing only the built-in backends.
pub fn builtin_backends() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    register_builtin_backends(&mut registry);
    registry
}

/// Build a [`BrokerQueue`] over Redis.
///
/// Options: `name` (queue name), `url` (Redis URL), `immediate`.
///
/// The URL is validated even in immediate mode, where no connection is ever
/// made. A malformed URL fails with [`QueueError::Configuration`].
pub fn redis_backend(
    config: &QueueConfig,
    jobs: &BTreeMap<String, JobRegistration>,
) -> Result<Arc<dyn JobQueue>, QueueError> {
    let name = queue_name(config)?;
    let url = options_str(&config.options, "url")?;
    let url = url.as_deref().unwrap_or(DEFAULT_REDIS_URL);
    let broker = RedisBroker::open(name, url)
        .map_err(|e| QueueError::Configuration(format!("redis url {:?}: {}", url, e)))?;
    let queue = BrokerQueue::new(REDIS_BACKEND, broker, config.options.clone(), jobs)?;
    Ok(Arc::new(queue))
}

/// Build a [`BrokerQueue`] over an in-process broker.
///
/// Options: `name` (queue name), `immediate`.
pub fn memory_backend(
    config: &QueueConfig,
    jobs: &BTreeMap<String, JobRegistration>,
) -> Result<Arc<dyn JobQueue>, QueueError> {
    let broker = MemoryBroker::new(queue_name(config)?);
    let queue = BrokerQueue::new(MEMORY_BACKEND, broker, config.options.clone(), jobs)?;
    Ok(Arc::new(queue))
}

/// The worker side of a queue built by one of the built-in backends.
pub fn task_source(queue: &dyn JobQueue) -> Option<&dyn TaskSource> {
    let any = queue.as_any();
    if let Some(q) = any.downcast_ref::<BrokerQueue<RedisBroker>>() {
        return Some(q);
    }
    if let Some(q) = any.downcast_ref::<BrokerQueue<MemoryBroker>>() {
        return Some(q);
    }
    None
}

fn queue_name(config: &QueueConfig) -> Result<String, QueueError> {
    Ok(options_str(&config.options, "name")?
        .map(Cow::into_owned)
        .unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_owned()))
}
