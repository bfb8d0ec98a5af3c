//! Call sites that work with or without a configured queue.

use serde_json::Value;

use crate::error::QueueError;
use crate::factory::QueueContext;
use crate::types::{JobArgs, JobKwargs, JobRegistration};

/// A registered job bound to a queue context.
///
/// Calling it enqueues the job through the active queue. It runs the body in
/// the current thread instead when it was created as synchronous or when no
/// queue is active.
#[derive(Debug, Clone)]
pub struct WrappedJob {
    registration: JobRegistration,
    context: QueueContext,
    synchronous: bool,
    returning: Option<Value>,
}

impl WrappedJob {
    /// Value returned by calls that enqueue instead of executing.
    #[must_use]
    pub fn returning(mut self, value: Value) -> Self {
        self.returning = Some(value);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.registration.name()
    }

    #[inline]
    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    pub fn call(&self, args: JobArgs, kwargs: JobKwargs) -> Result<Option<Value>, QueueError> {
        if !self.synchronous {
            if let Ok(queue) = self.context.get_job_queue() {
                queue.enqueue(self.name(), args, kwargs)?;
                return Ok(self.returning.clone());
            }
            tracing::debug!(job = self.name(), "no job queue active, running job in process");
        }

        self.registration
            .invoke(args, kwargs)
            .map(Some)
            .map_err(|source| QueueError::Execution {
                name: self.name().to_owned(),
                source,
            })
    }
}

impl QueueContext {
    /// Wrap the registered job `name`.
    ///
    /// Fails with [`QueueError::UnknownJob`] if no job of that name was registered.
    pub fn wrap_job(&self, name: &str, synchronous: bool) -> Result<WrappedJob, QueueError> {
        let registration = self
            .collector()
            .get(name)
            .cloned()
            .ok_or_else(|| QueueError::UnknownJob(name.to_owned()))?;
        Ok(WrappedJob {
            registration,
            context: self.clone(),
            synchronous,
            returning: None,
        })
    }
}

/// Free-function form of [`QueueContext::wrap_job`].
#[inline]
pub fn wrap_job(context: &QueueContext, name: &str, synchronous: bool) -> Result<WrappedJob, QueueError> {
    context.wrap_job(name, synchronous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::JobCollector;
    use crate::factory::{BackendRegistry, QueueConfig};
    use crate::types::job_fn;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn context(calls: Arc<AtomicUsize>) -> QueueContext {
        let mut collector = JobCollector::new();
        collector
            .register(
                "test.count",
                job_fn(move |call| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(call.arg::<i64>(0)? * 2))
                }),
            )
            .unwrap();
        QueueContext::new(QueueConfig::default(), Arc::new(collector), BackendRegistry::new())
    }

    #[test]
    fn synchronous_wrapper_returns_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = context(calls.clone());
        let wrapped = ctx.wrap_job("test.count", true).unwrap();

        let result = wrapped.call(vec![json!(21)], JobKwargs::new()).unwrap();
        assert_eq!(result, Some(json!(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn runs_in_process_without_queue() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = context(calls.clone());
        let wrapped = wrap_job(&ctx, "test.count", false).unwrap().returning(json!(true));

        // no queue: the body runs and its own result is returned
        let result = wrapped.call(vec![json!(1)], JobKwargs::new()).unwrap();
        assert_eq!(result, Some(json!(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_job_cannot_be_wrapped() {
        let ctx = context(Arc::new(AtomicUsize::new(0)));
        assert!(matches!(
            ctx.wrap_job("test.unknown", true),
            Err(QueueError::UnknownJob(_))
        ));
    }

    #[test]
    fn body_failure_is_reported() {
        let ctx = context(Arc::new(AtomicUsize::new(0)));
        let wrapped = ctx.wrap_job("test.count", true).unwrap();
        let err = wrapped.call(vec![json!("not a number")], JobKwargs::new()).unwrap_err();
        assert!(matches!(err, QueueError::Execution { ref name, .. } if name == "test.count"));
    }
}
