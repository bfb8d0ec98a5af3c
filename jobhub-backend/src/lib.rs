//! Application bootstrap for jobhub.
//!
//! [`create_app`] loads the job registry into a [`QueueContext`](jobhub_job_queue::QueueContext),
//! builds the configured queue backend and falls back to running without a
//! queue when that fails.

pub mod app;
pub mod state;
pub mod tracing_setup;

pub use app::{create_app, create_app_with_backends, default_collector, queue_config_from_config, App};
pub use state::AppState;
