//! Worker event extension points.
//!
//! The worker and the job execution path announce well-defined lifecycle
//! moments through an `EventNotifier`. Embedders plug in their own notifier
//! to hook metrics or plugins; the default just logs.

use crate::job::types::JobPayload;

/// Lifecycle moments announced by the worker and the execution path.
#[derive(Debug)]
pub enum WorkerEvent<'a> {
    /// The worker is about to spawn the isolated execution context for a job.
    BeforeDispatch { payload: &'a JobPayload },
    /// The execution context has been spawned; fired on the supervising side.
    AfterDispatch { payload: &'a JobPayload },
    /// The handler is about to run inside the execution context.
    BeforePerform { payload: &'a JobPayload },
    /// The handler completed normally.
    AfterPerform { payload: &'a JobPayload },
    /// The job is being recorded as failed.
    Failure { payload: &'a JobPayload, error: &'a str },
}

pub trait EventNotifier: Send + Sync {
    fn trigger(&self, event: WorkerEvent<'_>);
}

/// Default notifier: every event becomes a debug log line.
pub struct LogNotifier;

impl EventNotifier for LogNotifier {
    fn trigger(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::BeforeDispatch { payload } => {
                tracing::debug!("Dispatching job (handler: {})", payload.handler)
            }
            WorkerEvent::AfterDispatch { payload } => {
                tracing::debug!("Dispatched job (handler: {})", payload.handler)
            }
            WorkerEvent::BeforePerform { payload } => {
                tracing::debug!("Performing job (handler: {})", payload.handler)
            }
            WorkerEvent::AfterPerform { payload } => {
                tracing::debug!("Performed job (handler: {})", payload.handler)
            }
            WorkerEvent::Failure { payload, error } => {
                tracing::debug!("Job failed (handler: {}): {}", payload.handler, error)
            }
        }
    }
}
