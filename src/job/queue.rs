//! Queue client: the shared context for producers and workers.
//!
//! `JobQueue` bundles the cluster router with the handler registry, the
//! tracking collaborators, and the event notifier. Producers use it to
//! enqueue; workers use it to reserve and to record outcomes. It holds no
//! mutable state of its own — everything shared lives in the broker.

use super::job::Job;
use super::registry::HandlerRegistry;
use super::types::JobPayload;
use crate::broker::{Broker, ClusterRouter};
use crate::error::{Error, Result};
use crate::events::{EventNotifier, LogNotifier};
use crate::tracker::{FailureLog, Stat, StatusTracker};

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Broker set holding every known queue name; consulted for wildcard
/// resolution.
pub const QUEUES_KEY: &str = "queues";

pub fn queue_key(name: &str) -> String {
    format!("queue:{}", name)
}

pub struct JobQueue {
    router: Arc<ClusterRouter>,
    registry: Arc<HandlerRegistry>,
    stats: Stat,
    statuses: StatusTracker,
    failures: FailureLog,
    events: Arc<dyn EventNotifier>,
}

impl JobQueue {
    pub fn new(router: Arc<ClusterRouter>, registry: Arc<HandlerRegistry>) -> Arc<Self> {
        Self::with_notifier(router, registry, Arc::new(LogNotifier))
    }

    pub fn with_notifier(
        router: Arc<ClusterRouter>,
        registry: Arc<HandlerRegistry>,
        events: Arc<dyn EventNotifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            stats: Stat::new(router.clone()),
            statuses: StatusTracker::new(router.clone()),
            failures: FailureLog::new(router.clone()),
            router,
            registry,
            events,
        })
    }

    pub fn router(&self) -> &Arc<ClusterRouter> {
        &self.router
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Stat {
        &self.stats
    }

    pub fn statuses(&self) -> &StatusTracker {
        &self.statuses
    }

    pub fn failures(&self) -> &FailureLog {
        &self.failures
    }

    pub fn events(&self) -> &Arc<dyn EventNotifier> {
        &self.events
    }

    /// Enqueue one job.
    ///
    /// `args`, when supplied, must be a structured record (object or array);
    /// scalars are an `Argument` error and nothing is enqueued. A fresh
    /// unique id is generated and returned either way; it is embedded in the
    /// payload (and registered with the status tracker) only when `monitor`
    /// is set — tracking is purely additive bookkeeping.
    pub async fn create(
        &self,
        queue: &str,
        handler: &str,
        args: Option<serde_json::Value>,
        monitor: bool,
    ) -> Result<String> {
        if let Some(value) = &args {
            if !value.is_object() && !value.is_array() {
                return Err(Error::Argument(format!(
                    "args must be a structured record, got: {}",
                    value
                )));
            }
        }

        let id = Uuid::new_v4().to_string();
        let payload = JobPayload {
            handler: handler.to_string(),
            args: vec![args.unwrap_or(serde_json::Value::Null)],
            id: monitor.then(|| id.clone()),
        };

        let serialized = serde_json::to_string(&payload)?;
        self.router.sadd(QUEUES_KEY, queue).await?;
        self.router.rpush(&queue_key(queue), &serialized).await?;
        if monitor {
            self.statuses.create(&id).await?;
        }

        tracing::debug!("Created job {} on queue '{}' (handler: {})", id, queue, handler);
        Ok(id)
    }

    /// One atomic pop from `queue`. Returns None when the queue is empty;
    /// callers are expected to back off rather than busy-loop.
    pub async fn reserve(&self, queue: &str) -> Result<Option<Job>> {
        match self.router.lpop(&queue_key(queue)).await? {
            Some(serialized) => {
                let payload: JobPayload = serde_json::from_str(&serialized)?;
                Ok(Some(Job::new(queue, payload)))
            }
            None => Ok(None),
        }
    }

    /// Blocking reservation across several queues at once, honoring a
    /// timeout. Returns None when the timeout elapses with nothing to pop.
    pub async fn reserve_blocking(
        &self,
        queues: &[String],
        timeout: Duration,
    ) -> Result<Option<Job>> {
        let keys: Vec<String> = queues.iter().map(|q| queue_key(q)).collect();
        match self.router.blpop(&keys, timeout).await? {
            Some((key, serialized)) => {
                let queue = key.strip_prefix("queue:").unwrap_or(&key);
                let payload: JobPayload = serde_json::from_str(&serialized)?;
                Ok(Some(Job::new(queue, payload)))
            }
            None => Ok(None),
        }
    }

    /// Every queue name ever pushed to, alphabetically sorted. Read live from
    /// the broker on each call, never cached.
    pub async fn queues(&self) -> Result<Vec<String>> {
        let mut names = self.router.smembers(QUEUES_KEY).await?;
        names.sort();
        Ok(names)
    }

    /// Number of payloads currently sitting on a queue.
    pub async fn queue_len(&self, queue: &str) -> Result<u64> {
        self.router.llen(&queue_key(queue)).await
    }
}
