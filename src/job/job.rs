//! A reserved job and its execution protocol.

use super::queue::JobQueue;
use super::registry::{DontPerform, JobHandler};
use super::types::{JobPayload, JobStatus};
use crate::error::{Error, Result};
use crate::events::WorkerEvent;

use std::sync::Arc;

/// One unit of work popped off a queue.
///
/// The queue entry is gone the moment it was popped; job history lives only
/// in the status/failure collaborators. The handler instance is resolved
/// lazily on first use and cached for the lifetime of this value.
#[derive(Clone)]
pub struct Job {
    pub queue: String,
    pub payload: JobPayload,
    /// Id of the worker processing this job, once dispatched.
    pub worker: Option<String>,
    handler: Option<Arc<dyn JobHandler>>,
}

impl Job {
    pub fn new(queue: impl Into<String>, payload: JobPayload) -> Self {
        Self {
            queue: queue.into(),
            payload,
            worker: None,
            handler: None,
        }
    }

    pub fn set_worker(&mut self, worker_id: impl Into<String>) {
        self.worker = Some(worker_id.into());
    }

    /// Tracking id; present only for monitored jobs.
    pub fn id(&self) -> Option<&str> {
        self.payload.id.as_deref()
    }

    pub fn monitored(&self) -> bool {
        self.payload.id.is_some()
    }

    fn handler(&mut self, ctx: &JobQueue) -> Result<Arc<dyn JobHandler>> {
        if let Some(handler) = &self.handler {
            return Ok(handler.clone());
        }
        let handler = ctx.registry().resolve(&self.payload.handler)?;
        self.handler = Some(handler.clone());
        Ok(handler)
    }

    /// Run the handler's setup/perform/teardown sequence.
    ///
    /// Returns `Ok(true)` when the work ran, `Ok(false)` when setup or the
    /// work call abstained via `DontPerform` — a skip, not a failure, so no
    /// failure record is written. Every other error propagates to the caller
    /// (the worker's dispatch point) uncaught.
    pub async fn perform(&mut self, ctx: &JobQueue) -> Result<bool> {
        let handler = self.handler(ctx)?;
        let args = self.payload.arg();

        ctx.events().trigger(WorkerEvent::BeforePerform {
            payload: &self.payload,
        });

        if let Err(e) = handler.setup(&args).await {
            if e.downcast_ref::<DontPerform>().is_some() {
                tracing::debug!("Handler '{}' abstained in setup", self.payload.handler);
                return Ok(false);
            }
            return Err(Error::Handler(e));
        }

        if let Err(e) = handler.perform(&args).await {
            if e.downcast_ref::<DontPerform>().is_some() {
                tracing::debug!("Handler '{}' abstained", self.payload.handler);
                return Ok(false);
            }
            return Err(Error::Handler(e));
        }

        handler.teardown(&args).await.map_err(Error::Handler)?;

        ctx.events().trigger(WorkerEvent::AfterPerform {
            payload: &self.payload,
        });
        Ok(true)
    }

    /// Write a new tracked status. No-op for unmonitored jobs.
    pub async fn update_status(&self, ctx: &JobQueue, status: JobStatus) -> Result<()> {
        match self.id() {
            Some(id) => ctx.statuses().update(id, status).await,
            None => Ok(()),
        }
    }

    /// Current tracked status; None for unmonitored jobs.
    pub async fn status(&self, ctx: &JobQueue) -> Result<Option<JobStatus>> {
        match self.id() {
            Some(id) => ctx.statuses().get(id).await,
            None => Ok(None),
        }
    }

    /// Record this job as failed: failure notification, Failed status, a
    /// failure record, and the global + per-worker failed counters.
    pub async fn fail(&self, ctx: &JobQueue, error: &Error) -> Result<()> {
        let message = error.to_string();
        ctx.events().trigger(WorkerEvent::Failure {
            payload: &self.payload,
            error: &message,
        });

        self.update_status(ctx, JobStatus::Failed).await?;
        ctx.failures()
            .create(
                &self.payload,
                &message,
                self.worker.as_deref().unwrap_or(""),
                &self.queue,
            )
            .await?;
        ctx.stats().incr("failed").await?;
        if let Some(worker) = &self.worker {
            ctx.stats().incr(&format!("failed:{}", worker)).await?;
        }

        tracing::warn!(
            "Job on queue '{}' failed (handler: {}): {}",
            self.queue,
            self.payload.handler,
            message
        );
        Ok(())
    }

    /// Re-enqueue an identical job: same queue, handler, and argument record,
    /// with the monitored flag of the original.
    pub async fn recreate(&self, ctx: &JobQueue) -> Result<String> {
        let args = match self.payload.arg() {
            serde_json::Value::Null => None,
            value => Some(value),
        };
        ctx.create(&self.queue, &self.payload.handler, args, self.monitored())
            .await
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("queue", &self.queue)
            .field("payload", &self.payload)
            .field("worker", &self.worker)
            .finish()
    }
}
