//! Registry of named job bodies.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{DuplicateJobError, JobError};
use crate::types::{job_fn, JobArgs, JobCall, JobFn, JobKwargs, JobRegistration};

/// Collects job registrations before any queue backend is configured.
///
/// Jobs are registered during process initialization. The collector is then
/// frozen behind an `Arc` and handed to the queue factory, which passes the
/// full set of registrations to whichever backend gets constructed.
#[derive(Debug, Default, Clone)]
pub struct JobCollector {
    jobs: BTreeMap<String, JobRegistration>,
}

impl JobCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start registering a job under `name`.
    ///
    /// ```
    /// use jobhub_job_queue::JobCollector;
    /// use serde_json::json;
    ///
    /// let mut collector = JobCollector::new();
    /// let add = collector
    ///     .job("math.add")
    ///     .register(|call| Ok(json!(call.arg::<i64>(0)? + call.arg::<i64>(1)?)))
    ///     .unwrap();
    ///
    /// // The returned body stays directly callable.
    /// let call = jobhub_job_queue::JobCall::with_args(vec![json!(3), json!(4)]);
    /// assert_eq!(add(&call).unwrap(), json!(7));
    /// ```
    pub fn job(&mut self, name: impl Into<String>) -> JobBuilder<'_> {
        JobBuilder {
            collector: self,
            name: name.into(),
            default_args: JobArgs::new(),
            default_kwargs: JobKwargs::new(),
        }
    }

    /// Register a job body without default arguments.
    pub fn register(&mut self, name: impl Into<String>, callable: JobFn) -> Result<(), DuplicateJobError> {
        self.register_registration(JobRegistration::new(name, callable))
    }

    /// Insert a prebuilt registration.
    pub fn register_registration(&mut self, registration: JobRegistration) -> Result<(), DuplicateJobError> {
        if self.jobs.contains_key(registration.name()) {
            return Err(DuplicateJobError::new(registration.name()));
        }
        tracing::debug!(job = registration.name(), "registered job");
        self.jobs.insert(registration.name().to_owned(), registration);
        Ok(())
    }

    #[inline]
    pub fn jobs(&self) -> &BTreeMap<String, JobRegistration> {
        &self.jobs
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&JobRegistration> {
        self.jobs.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop every registration. Intended for test harnesses.
    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}

/// Pending registration returned by [`JobCollector::job`].
#[must_use = "a job is only registered once `register` is called"]
pub struct JobBuilder<'a> {
    collector: &'a mut JobCollector,
    name: String,
    default_args: JobArgs,
    default_kwargs: JobKwargs,
}

impl JobBuilder<'_> {
    pub fn default_args(mut self, args: JobArgs) -> Self {
        self.default_args = args;
        self
    }

    pub fn default_kwargs(mut self, kwargs: JobKwargs) -> Self {
        self.default_kwargs = kwargs;
        self
    }

    /// Record the job and hand the body back unchanged.
    pub fn register<F>(self, f: F) -> Result<JobFn, DuplicateJobError>
    where
        F: Fn(&JobCall) -> Result<Value, JobError> + Send + Sync + 'static,
    {
        self.register_fn(job_fn(f))
    }

    /// Same as [`register`](Self::register) for an already boxed body.
    pub fn register_fn(self, callable: JobFn) -> Result<JobFn, DuplicateJobError> {
        let registration = JobRegistration::new(self.name, callable.clone())
            .with_default_args(self.default_args)
            .with_default_kwargs(self.default_kwargs);
        self.collector.register_registration(registration)?;
        Ok(callable)
    }
}
