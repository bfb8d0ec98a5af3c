//! In-process broker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use jobhub_job_queue::TaskMessage;

use crate::broker::Broker;
use crate::error::BrokerError;

/// Broker keeping messages in memory.
///
/// Suitable for development, tests and single-process deployments. Delivery is
/// best effort: messages live only as long as the process does.
#[derive(Debug)]
pub struct MemoryBroker {
    name: String,
    messages: Mutex<VecDeque<TaskMessage>>,
    available: Condvar,
    closed: AtomicBool,
}

impl MemoryBroker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Reject further pushes and wake every waiting consumer.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.available.notify_all();
    }

    /// Snapshot of the waiting messages, oldest first.
    pub fn peek_all(&self) -> Vec<TaskMessage> {
        let messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        messages.iter().cloned().collect()
    }
}

impl Broker for MemoryBroker {
    fn name(&self) -> &str {
        &self.name
    }

    fn push(&self, message: &TaskMessage) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::Closed);
        }
        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        messages.push_back(message.clone());
        self.available.notify_one();
        Ok(())
    }

    fn pop(&self, timeout: Duration) -> Result<Option<TaskMessage>, BrokerError> {
        let messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut messages, _) = self
            .available
            .wait_timeout_while(messages, timeout, |m| {
                m.is_empty() && !self.closed.load(Ordering::Acquire)
            })
            .unwrap_or_else(PoisonError::into_inner);
        Ok(messages.pop_front())
    }

    fn pending(&self) -> Result<usize, BrokerError> {
        let messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(messages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobhub_job_queue::JobKwargs;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn message(n: i64) -> TaskMessage {
        TaskMessage::new("test.my_add", vec![json!(n)], JobKwargs::new())
    }

    #[test]
    fn fifo_order() {
        let broker = MemoryBroker::new("q");
        broker.push(&message(1)).unwrap();
        broker.push(&message(2)).unwrap();
        assert_eq!(broker.pending().unwrap(), 2);

        let first = broker.pop(Duration::ZERO).unwrap().unwrap();
        assert_eq!(first.args, vec![json!(1)]);
        assert_eq!(broker.peek_all().len(), 1);
    }

    #[test]
    fn pop_times_out_when_empty() {
        let broker = MemoryBroker::new("q");
        assert!(broker.pop(Duration::from_millis(10)).unwrap().is_none());
    }

    #[test]
    fn pop_wakes_on_push() {
        let broker = Arc::new(MemoryBroker::new("q"));
        let consumer = {
            let broker = Arc::clone(&broker);
            thread::spawn(move || broker.pop(Duration::from_secs(5)).unwrap())
        };
        thread::sleep(Duration::from_millis(20));
        broker.push(&message(7)).unwrap();
        let received = consumer.join().unwrap().unwrap();
        assert_eq!(received.args, vec![json!(7)]);
    }

    #[test]
    fn closed_broker_rejects_pushes() {
        let broker = MemoryBroker::new("q");
        broker.close();
        assert!(matches!(broker.push(&message(1)), Err(BrokerError::Closed)));
        assert!(broker.pop(Duration::from_secs(5)).unwrap().is_none());
    }
}
