//! Email sending job.

use std::fmt;
use std::sync::Arc;

use jobhub_job_queue::{DuplicateJobError, JobCall, JobCollector, JobError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::job_types;

/// Errors raised by a mail sender.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("no recipient given")]
    NoRecipient,

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Payload for the smtpserver.send_email job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Identifier of the configured SMTP server to use.
    pub identifier: String,
    #[serde(deserialize_with = "one_or_many")]
    pub recipient: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default = "default_mimetype")]
    pub mimetype: String,
}

fn default_mimetype() -> String {
    "plain".to_string()
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(r) => vec![r],
        OneOrMany::Many(rs) => rs,
    })
}

/// Delivers email on behalf of the send_email job.
pub trait MailSender: Send + Sync + fmt::Debug {
    /// Send `message`, returning whether the server accepted it.
    fn send_email(&self, message: &EmailMessage) -> Result<bool, MailError>;
}

/// Sender that only logs the message.
///
/// Used when no SMTP delivery is wired in, e.g. in development.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailSender;

impl MailSender for LogMailSender {
    fn send_email(&self, message: &EmailMessage) -> Result<bool, MailError> {
        if message.recipient.is_empty() {
            return Err(MailError::NoRecipient);
        }
        info!(
            identifier = %message.identifier,
            recipients = ?message.recipient,
            subject = %message.subject,
            mimetype = %message.mimetype,
            "email handed to log sender"
        );
        Ok(true)
    }
}

pub(crate) fn register(
    collector: &mut JobCollector,
    mailer: Arc<dyn MailSender>,
) -> Result<(), DuplicateJobError> {
    collector
        .job(job_types::SEND_EMAIL)
        .register(move |call| send_email(mailer.as_ref(), call))?;
    Ok(())
}

/// Accepts the message as keyword arguments, or as a single positional object.
fn send_email(mailer: &dyn MailSender, call: &JobCall) -> Result<Value, JobError> {
    let message: EmailMessage = match call.args.as_slice() {
        [Value::Object(_)] if call.kwargs.is_empty() => call.arg(0)?,
        _ => call.kwargs_as()?,
    };

    info!(
        identifier = %message.identifier,
        recipients = message.recipient.len(),
        "executing smtpserver.send_email job"
    );

    let sent = mailer
        .send_email(&message)
        .map_err(|e| JobError::Failed(e.to_string()))?;
    Ok(json!(sent))
}
