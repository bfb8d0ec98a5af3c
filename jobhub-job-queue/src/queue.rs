//! The contract every job queue backend implements.

use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::QueueError;
use crate::types::{JobArgs, JobFn, JobKwargs, JobRegistration};

/// Backend options taken verbatim from configuration.
pub type QueueOptions = BTreeMap<String, Value>;

/// A queue that dispatches registered jobs for execution.
///
/// Implementations are constructed with the full set of registrations and
/// must wire every one of them into their underlying broker before they are
/// handed out. After that, only names known to the queue can be enqueued.
pub trait JobQueue: Send + Sync + fmt::Debug {
    /// Key of the backend this queue was built from.
    fn backend(&self) -> &str;

    /// Effective backend configuration.
    fn options(&self) -> &QueueOptions;

    /// Names of all jobs known to the queue, sorted.
    fn jobs(&self) -> Vec<String>;

    /// Register a job, including its default arguments.
    ///
    /// Fails with [`QueueError::JobExists`] if the name is already known; the
    /// existing registration is left untouched.
    fn register(&self, registration: JobRegistration) -> Result<(), QueueError>;

    /// Register a job body without default arguments.
    fn register_job(&self, name: &str, callable: JobFn) -> Result<(), QueueError> {
        self.register(JobRegistration::new(name, callable))
    }

    /// Hand a job off for execution.
    ///
    /// Returns once the job has been dispatched, without waiting for a result.
    /// Backends running in immediate mode execute the body before returning
    /// and discard its result.
    fn enqueue(&self, name: &str, args: JobArgs, kwargs: JobKwargs) -> Result<(), QueueError>;

    /// Access to the concrete backend type.
    fn as_any(&self) -> &dyn Any;
}

/// Register every job of a snapshot, stopping at the first failure.
pub fn register_all<'a, Q, I>(queue: &Q, registrations: I) -> Result<(), QueueError>
where
    Q: JobQueue + ?Sized,
    I: IntoIterator<Item = &'a JobRegistration>,
{
    for registration in registrations {
        queue.register(registration.clone())?;
    }
    Ok(())
}

/// Read a string option.
///
/// Numbers and booleans are accepted and rendered as text, so values coming
/// from environment variables (`NAME=2024`) still name a queue.
pub fn options_str<'a>(options: &'a QueueOptions, key: &str) -> Result<Option<Cow<'a, str>>, QueueError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(Cow::Borrowed(s.as_str()))),
        Some(Value::Number(n)) => Ok(Some(Cow::Owned(n.to_string()))),
        Some(Value::Bool(b)) => Ok(Some(Cow::Owned(b.to_string()))),
        Some(other) => Err(QueueError::Configuration(format!(
            "option {:?} must be a string, got {}",
            key, other
        ))),
    }
}

/// Read a boolean option. Accepts booleans and the strings "true"/"false".
pub fn options_bool(options: &QueueOptions, key: &str) -> Result<Option<bool>, QueueError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(other) => Err(QueueError::Configuration(format!(
            "option {:?} must be a boolean, got {}",
            key, other
        ))),
    }
}
