//! Job Module
//!
//! A job is one unit of enqueued work: a handler identifier plus a single
//! argument record, serialized onto a named queue in the broker. This module
//! covers the whole job protocol:
//!
//! ## Core Concepts
//! - **Creation**: `JobQueue::create` validates arguments, assigns a fresh id,
//!   and pushes the wire payload through the cluster router.
//! - **Reservation**: `JobQueue::reserve` performs one atomic pop; the
//!   broker's pop is the sole mutual-exclusion mechanism, so a job is
//!   processed by at most one worker.
//! - **Execution**: `Job::perform` resolves the registered handler through the
//!   `HandlerRegistry` and drives the setup/perform/teardown lifecycle.
//! - **Failure**: `Job::fail` records the failure, bumps counters, and flips
//!   the tracked status — jobs fail, workers keep running.

pub mod job;
pub mod queue;
pub mod registry;
pub mod types;

pub use job::Job;
pub use queue::JobQueue;
pub use registry::{DontPerform, HandlerRegistry, JobHandler};
pub use types::{JobPayload, JobStatus};

#[cfg(test)]
mod tests;
