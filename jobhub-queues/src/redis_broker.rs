//! Redis-backed broker.
//!
//! Messages are JSON-encoded [`TaskMessage`]s kept in a Redis list. Producers
//! `LPUSH` onto `jobhub.queue.{name}` and workers `BRPOP` from it, so several
//! workers can compete for the same queue.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use jobhub_job_queue::TaskMessage;

use crate::broker::Broker;
use crate::error::BrokerError;

const KEY_PREFIX: &str = "jobhub.queue.";

/// Broker storing messages in a Redis list.
///
/// Delivery is at most once: a message removed by `BRPOP` is not re-delivered
/// if the worker dies while executing it.
///
/// No connection is made until the first push or pop, so a broker can be
/// built for a queue running in immediate mode without a Redis server.
///
/// Producers and consumers use separate connections: a `push` never waits
/// behind a blocking `BRPOP`.
pub struct RedisBroker {
    name: String,
    key: String,
    client: redis::Client,
    producer: Mutex<Option<redis::Connection>>,
    consumer: Mutex<Option<redis::Connection>>,
}

impl std::fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBroker")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("producer", &"<Mutex<Option<redis::Connection>>>")
            .field("consumer", &"<Mutex<Option<redis::Connection>>>")
            .finish()
    }
}

impl RedisBroker {
    /// Create a broker for queue `name` at `url` (e.g. "redis://127.0.0.1:6379/").
    pub fn open(name: impl Into<String>, url: &str) -> Result<Self, BrokerError> {
        let name = name.into();
        let client = redis::Client::open(url)?;
        Ok(Self {
            key: format!("{}{}", KEY_PREFIX, name),
            name,
            client,
            producer: Mutex::new(None),
            consumer: Mutex::new(None),
        })
    }

    /// Redis key of the backing list.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Run `f` on the connection held in `slot`, dropping it after a failure
    /// so the next call reconnects.
    fn with_connection<T>(
        &self,
        slot: &Mutex<Option<redis::Connection>>,
        f: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
    ) -> Result<T, BrokerError> {
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(self.client.get_connection()?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(BrokerError::Closed);
        };
        match f(conn) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(queue = %self.name, error = %e, "redis command failed, dropping connection");
                *guard = None;
                Err(e.into())
            }
        }
    }
}

impl Broker for RedisBroker {
    fn name(&self) -> &str {
        &self.name
    }

    fn push(&self, message: &TaskMessage) -> Result<(), BrokerError> {
        let payload = serde_json::to_string(message)?;
        self.with_connection(&self.producer, |conn| {
            redis::cmd("LPUSH")
                .arg(&self.key)
                .arg(&payload)
                .query::<i64>(conn)
        })?;
        Ok(())
    }

    fn pop(&self, timeout: Duration) -> Result<Option<TaskMessage>, BrokerError> {
        let popped: Option<String> = if timeout.is_zero() {
            self.with_connection(&self.consumer, |conn| {
                redis::cmd("RPOP").arg(&self.key).query(conn)
            })?
        } else {
            let seconds = blocking_seconds(timeout);
            let reply: Option<(String, String)> = self.with_connection(&self.consumer, |conn| {
                redis::cmd("BRPOP").arg(&self.key).arg(seconds).query(conn)
            })?;
            reply.map(|(_key, payload)| payload)
        };
        match popped {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    fn pending(&self) -> Result<usize, BrokerError> {
        self.with_connection(&self.producer, |conn| redis::cmd("LLEN").arg(&self.key).query::<usize>(conn))
    }
}

/// `BRPOP` timeout for a non-zero wait, rounded up to whole seconds.
///
/// Zero would block forever, and fractional timeouts need Redis 6.
fn blocking_seconds(timeout: Duration) -> u64 {
    (timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)).max(1)
}
