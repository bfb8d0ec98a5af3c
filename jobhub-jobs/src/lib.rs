//! Concrete job registrations for the jobhub backend.
//!
//! Job bodies here are thin adapters: they decode the job arguments and hand
//! the work to a collaborator, such as a [`MailSender`].
//!
//! # Job Types
//!
//! - `smtpserver.send_email` - Send an email through the configured sender
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use jobhub_job_queue::JobCollector;
//! use jobhub_jobs::{register_all, LogMailSender};
//!
//! let mut collector = JobCollector::new();
//! register_all(&mut collector, Arc::new(LogMailSender)).unwrap();
//! assert!(collector.contains(jobhub_jobs::job_types::SEND_EMAIL));
//! ```

mod mail;

pub use mail::{EmailMessage, LogMailSender, MailError, MailSender};

use std::sync::Arc;

use jobhub_job_queue::{DuplicateJobError, JobCollector};

/// Register every job shipped with the backend.
pub fn register_all(
    collector: &mut JobCollector,
    mailer: Arc<dyn MailSender>,
) -> Result<(), DuplicateJobError> {
    mail::register(collector, mailer)?;
    Ok(())
}

/// Job type constants for type-safe job references.
pub mod job_types {
    pub const SEND_EMAIL: &str = "smtpserver.send_email";
}
