//! Registry and queue abstraction for deferred job execution.
//!
//! Jobs are registered by name into a [`JobCollector`] during process
//! initialization, before any configuration is known. Once configuration is
//! available, a [`QueueContext`] resolves the configured backend from a
//! [`BackendRegistry`] and constructs it with every registered job.
//!
//! # Architecture
//!
//! - [`JobCollector`] - Name to job body registry
//! - [`JobQueue`] - Contract implemented by queue backends
//! - [`QueueContext`] - Lazily constructed queue for an application
//! - [`WrappedJob`] - Enqueues a job, or runs it in process when no queue is active
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use jobhub_job_queue::{BackendRegistry, JobCollector, QueueConfig, QueueContext};
//! use serde_json::json;
//!
//! let mut collector = JobCollector::new();
//! collector
//!     .job("math.add")
//!     .register(|call| Ok(json!(call.arg::<i64>(0)? + call.arg::<i64>(1)?)))
//!     .unwrap();
//!
//! let ctx = QueueContext::new(QueueConfig::default(), Arc::new(collector), BackendRegistry::new());
//! assert!(!ctx.has_job_queue());
//!
//! let add = ctx.wrap_job("math.add", false).unwrap();
//! let result = add.call(vec![json!(3), json!(4)], Default::default()).unwrap();
//! assert_eq!(result, Some(json!(7)));
//! ```

mod collector;
mod error;
mod factory;
mod queue;
mod types;
mod wrap;

pub use collector::{JobBuilder, JobCollector};
pub use error::{DuplicateJobError, JobError, QueueError, ServerError};
pub use factory::{build_queue, BackendFactory, BackendRegistry, QueueConfig, QueueContext, QueueState};
pub use queue::{options_bool, options_str, register_all, JobQueue, QueueOptions};
pub use types::{job_fn, JobArgs, JobCall, JobFn, JobKwargs, JobRegistration, TaskMessage};
pub use wrap::{wrap_job, WrappedJob};
