use std::sync::Arc;

use jobhub_config::{Config, JobQueueConfig};
use jobhub_job_queue::{BackendRegistry, DuplicateJobError, JobCollector, QueueConfig, QueueContext};
use jobhub_jobs::MailSender;
use jobhub_queues::builtin_backends;

use crate::state::AppState;

/// Application handle returned by [`create_app`].
pub type App = AppState;

/// Translate the `[job_queue]` section into the factory's configuration.
pub fn queue_config_from_config(cfg: &JobQueueConfig) -> QueueConfig {
    QueueConfig::new(cfg.class.trim(), cfg.options.clone())
}

/// Collector holding every job shipped with the server.
pub fn default_collector(mailer: Arc<dyn MailSender>) -> Result<JobCollector, DuplicateJobError> {
    let mut collector = JobCollector::new();
    jobhub_jobs::register_all(&mut collector, mailer)?;
    Ok(collector)
}

/// Build the application with the built-in queue backends.
///
/// Never fails because of the queue: an invalid `[job_queue]` section or a
/// backend that cannot be constructed is logged and the application runs
/// without one.
pub fn create_app(config: Config, collector: JobCollector) -> App {
    create_app_with_backends(config, collector, builtin_backends())
}

pub fn create_app_with_backends(config: Config, collector: JobCollector, backends: BackendRegistry) -> App {
    let queue = QueueContext::new(
        queue_config_from_config(&config.job_queue),
        Arc::new(collector),
        backends,
    );
    match jobhub_config::validate_job_queue(&config.job_queue) {
        Ok(()) => initialize_or_degrade(&queue),
        Err(error) => {
            tracing::warn!(
                %error,
                backend = %config.job_queue.class,
                "invalid job queue configuration, continuing without one"
            );
            queue.mark_unavailable(error.to_string());
        }
    }
    AppState::new(config, queue)
}

pub(crate) fn initialize_or_degrade(queue: &QueueContext) {
    match queue.initialize() {
        Ok(()) => {
            if queue.has_job_queue() {
                tracing::info!(backend = %queue.config().backend, "job queue ready");
            } else {
                tracing::info!("no job queue configured, jobs run in process");
            }
        }
        Err(error) => {
            tracing::warn!(
                %error,
                backend = %queue.config().backend,
                "could not create job queue, continuing without one"
            );
        }
    }
}
