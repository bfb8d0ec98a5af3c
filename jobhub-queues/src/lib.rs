//! Broker-backed implementations of the [`JobQueue`](jobhub_job_queue::JobQueue) contract.
//!
//! # Backends
//!
//! - `redis` - [`BrokerQueue`] over a [`RedisBroker`]
//! - `memory` - [`BrokerQueue`] over a [`MemoryBroker`]
//!
//! Both honor the `immediate` option, which runs jobs in the calling thread
//! instead of publishing them. [`Consumer`] is the worker side: it pulls
//! published tasks and executes the registered job bodies.

mod backends;
mod broker;
mod consumer;
mod error;
mod memory;
mod queue;
mod redis_broker;

pub use backends::{
    builtin_backends, memory_backend, redis_backend, register_builtin_backends, task_source,
    DEFAULT_QUEUE_NAME, DEFAULT_REDIS_URL, MEMORY_BACKEND, REDIS_BACKEND,
};
pub use broker::Broker;
pub use consumer::Consumer;
pub use error::BrokerError;
pub use memory::MemoryBroker;
pub use queue::{BrokerQueue, TaskOutcome, TaskSource};
pub use redis_broker::RedisBroker;
