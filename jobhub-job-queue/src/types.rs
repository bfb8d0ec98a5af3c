//! Core types for the job queue system.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::JobError;

/// Positional job arguments.
pub type JobArgs = Vec<Value>;

/// Keyword job arguments.
pub type JobKwargs = Map<String, Value>;

/// A job body. Receives the prepared call and returns the job's result.
pub type JobFn = Arc<dyn Fn(&JobCall) -> Result<Value, JobError> + Send + Sync>;

/// Wrap a closure into a [`JobFn`].
#[inline]
pub fn job_fn<F>(f: F) -> JobFn
where
    F: Fn(&JobCall) -> Result<Value, JobError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Arguments of a single job invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobCall {
    #[serde(default)]
    pub args: JobArgs,
    #[serde(default)]
    pub kwargs: JobKwargs,
}

impl JobCall {
    #[inline]
    pub fn new(args: JobArgs, kwargs: JobKwargs) -> Self {
        Self { args, kwargs }
    }

    #[inline]
    pub fn with_args(args: JobArgs) -> Self {
        Self::new(args, JobKwargs::new())
    }

    /// Deserialize the positional argument at `index`.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, JobError> {
        let value = self.args.get(index).ok_or_else(|| {
            JobError::InvalidArguments(format!("missing positional argument {}", index))
        })?;
        serde_json::from_value(value.clone())
            .map_err(|e| JobError::InvalidArguments(format!("argument {}: {}", index, e)))
    }

    /// Deserialize the keyword argument `key`.
    pub fn kwarg<T: DeserializeOwned>(&self, key: &str) -> Result<T, JobError> {
        self.kwarg_opt(key)?
            .ok_or_else(|| JobError::InvalidArguments(format!("missing keyword argument {:?}", key)))
    }

    /// Deserialize the keyword argument `key` if it was supplied.
    pub fn kwarg_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, JobError> {
        match self.kwargs.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| JobError::InvalidArguments(format!("argument {:?}: {}", key, e))),
            None => Ok(None),
        }
    }

    /// Deserialize all keyword arguments into a payload struct.
    pub fn kwargs_as<T: DeserializeOwned>(&self) -> Result<T, JobError> {
        serde_json::from_value(Value::Object(self.kwargs.clone()))
            .map_err(|e| JobError::InvalidArguments(format!("invalid payload: {}", e)))
    }
}

/// A named job body together with its default arguments.
#[derive(Clone)]
pub struct JobRegistration {
    name: String,
    callable: JobFn,
    default_args: JobArgs,
    default_kwargs: JobKwargs,
}

impl fmt::Debug for JobRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistration")
            .field("name", &self.name)
            .field("callable", &"<JobFn>")
            .field("default_args", &self.default_args)
            .field("default_kwargs", &self.default_kwargs)
            .finish()
    }
}

impl JobRegistration {
    #[inline]
    pub fn new(name: impl Into<String>, callable: JobFn) -> Self {
        Self {
            name: name.into(),
            callable,
            default_args: JobArgs::new(),
            default_kwargs: JobKwargs::new(),
        }
    }

    #[must_use]
    pub fn with_default_args(mut self, args: JobArgs) -> Self {
        self.default_args = args;
        self
    }

    #[must_use]
    pub fn with_default_kwargs(mut self, kwargs: JobKwargs) -> Self {
        self.default_kwargs = kwargs;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn callable(&self) -> &JobFn {
        &self.callable
    }

    #[inline]
    pub fn default_args(&self) -> &JobArgs {
        &self.default_args
    }

    #[inline]
    pub fn default_kwargs(&self) -> &JobKwargs {
        &self.default_kwargs
    }

    /// Combine caller arguments with the registered defaults.
    ///
    /// Trailing default positional arguments fill the positions the caller
    /// left out. Caller keyword arguments override default ones.
    pub fn prepare(&self, mut args: JobArgs, kwargs: JobKwargs) -> JobCall {
        if args.len() < self.default_args.len() {
            args.extend(self.default_args[args.len()..].iter().cloned());
        }
        let mut merged = self.default_kwargs.clone();
        merged.extend(kwargs);
        JobCall::new(args, merged)
    }

    /// Run the job body in the current thread.
    pub fn invoke(&self, args: JobArgs, kwargs: JobKwargs) -> Result<Value, JobError> {
        let call = self.prepare(args, kwargs);
        (self.callable)(&call)
    }
}

/// Envelope a broker transports for one enqueued job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub args: JobArgs,
    #[serde(default)]
    pub kwargs: JobKwargs,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
}

impl TaskMessage {
    #[inline]
    pub fn new(name: impl Into<String>, args: JobArgs, kwargs: JobKwargs) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            args,
            kwargs,
            enqueued_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo() -> JobFn {
        job_fn(|call| Ok(json!({"args": call.args, "kwargs": call.kwargs})))
    }

    #[test]
    fn prepare_fills_trailing_defaults() {
        let reg = JobRegistration::new("echo", echo())
            .with_default_args(vec![json!(1), json!(2), json!(3)]);

        let call = reg.prepare(vec![json!(10)], JobKwargs::new());
        assert_eq!(call.args, vec![json!(10), json!(2), json!(3)]);

        let call = reg.prepare(vec![json!(10), json!(20), json!(30), json!(40)], JobKwargs::new());
        assert_eq!(call.args.len(), 4);
        assert_eq!(call.args[2], json!(30));
    }

    #[test]
    fn caller_kwargs_override_defaults() {
        let mut defaults = JobKwargs::new();
        defaults.insert("retries".into(), json!(3));
        defaults.insert("priority".into(), json!("low"));
        let reg = JobRegistration::new("echo", echo()).with_default_kwargs(defaults);

        let mut kwargs = JobKwargs::new();
        kwargs.insert("priority".into(), json!("high"));
        let call = reg.prepare(Vec::new(), kwargs);

        assert_eq!(call.kwargs["retries"], json!(3));
        assert_eq!(call.kwargs["priority"], json!("high"));
    }

    #[test]
    fn typed_accessors_report_bad_arguments() {
        let call = JobCall::with_args(vec![json!("hi")]);
        assert_eq!(call.arg::<String>(0).unwrap(), "hi");
        assert!(matches!(call.arg::<i64>(0), Err(JobError::InvalidArguments(_))));
        assert!(matches!(call.arg::<String>(1), Err(JobError::InvalidArguments(_))));
        assert!(matches!(call.kwarg::<String>("to"), Err(JobError::InvalidArguments(_))));
        assert_eq!(call.kwarg_opt::<String>("to").unwrap(), None);
    }

    #[test]
    fn task_message_serializes_as_json() {
        let msg = TaskMessage::new("test.my_add", vec![json!(3), json!(4)], JobKwargs::new());
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: TaskMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }
}
