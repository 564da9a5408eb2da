//! Broker connection interface and the in-memory implementation.
//!
//! The broker is a shared external service; everything above it talks through
//! the narrow `Broker` trait so workers on different machines only ever see
//! each other through broker state. `MemoryBroker` keeps the whole command
//! surface in one process, which is what the test suite and single-process
//! deployments run against.

use crate::error::{Error, Result};

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Command surface of a single broker shard.
///
/// Mirrors the protocol the queue consumes: list push/pop (FIFO via `rpush` +
/// `lpop`), a blocking multi-queue pop with timeout, set membership, plain
/// strings, counters, and a handful of administrative commands with
/// connection-local semantics.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Append a value to the tail of a list. Returns the new list length.
    async fn rpush(&self, key: &str, value: &str) -> Result<u64>;

    /// Atomically remove and return the head of a list, or None when empty.
    async fn lpop(&self, key: &str) -> Result<Option<String>>;

    /// Length of a list (0 for a missing key).
    async fn llen(&self, key: &str) -> Result<u64>;

    /// Slice of a list between `start` and `stop` inclusive; negative indices
    /// count from the tail, `(0, -1)` reads the whole list.
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;

    /// Block until any of `keys` has an element to pop, or the timeout
    /// elapses. Keys are tried in the given order on every wakeup; returns
    /// the winning key and the popped value, or None on timeout.
    async fn blpop(&self, keys: &[String], timeout: Duration) -> Result<Option<(String, String)>>;

    /// Add a member to a set. Returns true when the member was newly added.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove a member from a set. Returns true when the member existed.
    async fn srem(&self, key: &str, member: &str) -> Result<bool>;

    async fn sismember(&self, key: &str, member: &str) -> Result<bool>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a key of any kind. Returns true when the key existed.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Add `delta` to an integer counter, creating it at 0 first.
    async fn incrby(&self, key: &str, delta: i64) -> Result<i64>;

    async fn incr(&self, key: &str) -> Result<i64> {
        self.incrby(key, 1).await
    }

    async fn decr(&self, key: &str) -> Result<i64> {
        self.incrby(key, -1).await
    }

    /// Drop every key on this shard.
    async fn flushall(&self) -> Result<()>;

    /// Number of keys on this shard.
    async fn dbsize(&self) -> Result<u64>;

    /// Human-readable connection/server info line.
    async fn info(&self) -> Result<String>;

    /// Liveness check against the underlying transport.
    async fn ping(&self) -> Result<()>;

    /// Re-establish the underlying transport after a connection loss.
    async fn reconnect(&self) -> Result<()>;

    /// Endpoint this connection points at, as `host:port`.
    fn endpoint(&self) -> &str;
}

/// One stored value. Commands against a key holding the wrong kind fail,
/// mirroring the broker protocol's type errors.
enum Value {
    List(VecDeque<String>),
    Set(BTreeSet<String>),
    Str(String),
}

/// In-process broker shard backed by a `DashMap`.
///
/// Pop atomicity comes from the per-entry lock: `lpop` holds the entry while
/// removing the head, so two concurrent reservers can never receive the same
/// element. Blocked `blpop` callers are woken on every push.
pub struct MemoryBroker {
    endpoint: String,
    data: DashMap<String, Value>,
    pushed: Notify,
    connected: AtomicBool,
    accept_reconnects: AtomicBool,
}

impl MemoryBroker {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            data: DashMap::new(),
            pushed: Notify::new(),
            connected: AtomicBool::new(true),
            accept_reconnects: AtomicBool::new(true),
        }
    }

    /// Simulate a transport failure: every subsequent command fails with
    /// `ConnectionLost` until `reconnect` succeeds.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Make future `reconnect` attempts fail as well.
    pub fn refuse_reconnects(&self) {
        self.accept_reconnects.store(false, Ordering::SeqCst);
    }

    fn check_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ConnectionLost(self.endpoint.clone()))
        }
    }

    fn try_lpop(&self, key: &str) -> Result<Option<String>> {
        let Some(mut entry) = self.data.get_mut(key) else {
            return Ok(None);
        };
        let popped = match entry.value_mut() {
            Value::List(list) => list.pop_front(),
            _ => return Err(Error::WrongKind(key.to_string())),
        };
        drop(entry);
        // Remove exhausted lists so dbsize reflects live keys only.
        if popped.is_some() {
            self.data
                .remove_if(key, |_, v| matches!(v, Value::List(l) if l.is_empty()));
        }
        Ok(popped)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn rpush(&self, key: &str, value: &str) -> Result<u64> {
        self.check_connected()?;
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Value::List(VecDeque::new()));
        let len = match entry.value_mut() {
            Value::List(list) => {
                list.push_back(value.to_string());
                list.len() as u64
            }
            _ => return Err(Error::WrongKind(key.to_string())),
        };
        drop(entry);
        self.pushed.notify_waiters();
        Ok(len)
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>> {
        self.check_connected()?;
        self.try_lpop(key)
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        self.check_connected()?;
        match self.data.get(key) {
            Some(entry) => match entry.value() {
                Value::List(list) => Ok(list.len() as u64),
                _ => Err(Error::WrongKind(key.to_string())),
            },
            None => Ok(0),
        }
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.check_connected()?;
        let Some(entry) = self.data.get(key) else {
            return Ok(Vec::new());
        };
        let list = match entry.value() {
            Value::List(list) => list,
            _ => return Err(Error::WrongKind(key.to_string())),
        };
        let len = list.len() as i64;
        let clamp = |index: i64| -> usize {
            let resolved = if index < 0 { len + index } else { index };
            resolved.clamp(0, len) as usize
        };
        let (from, to) = (clamp(start), clamp(stop).saturating_add(1).min(len as usize));
        if from >= to {
            return Ok(Vec::new());
        }
        Ok(list.iter().skip(from).take(to - from).cloned().collect())
    }

    async fn blpop(&self, keys: &[String], timeout: Duration) -> Result<Option<(String, String)>> {
        let deadline = Instant::now() + timeout;
        loop {
            self.check_connected()?;
            // Register for wakeups before scanning, so a push racing the scan
            // is not lost.
            let notified = self.pushed.notified();
            for key in keys {
                if let Some(value) = self.try_lpop(key)? {
                    return Ok(Some((key.clone(), value)));
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        self.check_connected()?;
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()));
        match entry.value_mut() {
            Value::Set(set) => Ok(set.insert(member.to_string())),
            _ => Err(Error::WrongKind(key.to_string())),
        }
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        self.check_connected()?;
        match self.data.get_mut(key) {
            Some(mut entry) => match entry.value_mut() {
                Value::Set(set) => Ok(set.remove(member)),
                _ => Err(Error::WrongKind(key.to_string())),
            },
            None => Ok(false),
        }
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        self.check_connected()?;
        match self.data.get(key) {
            Some(entry) => match entry.value() {
                Value::Set(set) => Ok(set.contains(member)),
                _ => Err(Error::WrongKind(key.to_string())),
            },
            None => Ok(false),
        }
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.check_connected()?;
        match self.data.get(key) {
            Some(entry) => match entry.value() {
                Value::Set(set) => Ok(set.iter().cloned().collect()),
                _ => Err(Error::WrongKind(key.to_string())),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_connected()?;
        match self.data.get(key) {
            Some(entry) => match entry.value() {
                Value::Str(s) => Ok(Some(s.clone())),
                _ => Err(Error::WrongKind(key.to_string())),
            },
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_connected()?;
        self.data
            .insert(key.to_string(), Value::Str(value.to_string()));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.check_connected()?;
        Ok(self.data.remove(key).is_some())
    }

    async fn incrby(&self, key: &str, delta: i64) -> Result<i64> {
        self.check_connected()?;
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Value::Str("0".to_string()));
        match entry.value_mut() {
            Value::Str(s) => {
                let current: i64 = s
                    .parse()
                    .map_err(|_| Error::WrongKind(key.to_string()))?;
                let next = current + delta;
                *s = next.to_string();
                Ok(next)
            }
            _ => Err(Error::WrongKind(key.to_string())),
        }
    }

    async fn flushall(&self) -> Result<()> {
        self.check_connected()?;
        self.data.clear();
        Ok(())
    }

    async fn dbsize(&self) -> Result<u64> {
        self.check_connected()?;
        Ok(self.data.len() as u64)
    }

    async fn info(&self) -> Result<String> {
        self.check_connected()?;
        Ok(format!(
            "memory-broker endpoint={} keys={}",
            self.endpoint,
            self.data.len()
        ))
    }

    async fn ping(&self) -> Result<()> {
        self.check_connected()
    }

    async fn reconnect(&self) -> Result<()> {
        if !self.accept_reconnects.load(Ordering::SeqCst) {
            return Err(Error::ConnectionLost(self.endpoint.clone()));
        }
        if !self.connected.swap(true, Ordering::SeqCst) {
            tracing::info!("Re-established broker connection to {}", self.endpoint);
        }
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
