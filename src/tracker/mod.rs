//! Tracking Collaborators
//!
//! Thin clients over the cluster router for the bookkeeping the core reports
//! into: named counters, per-job status records, and the failure log. Each is
//! a narrow interface over a handful of broker keys; all shared state lives
//! in the broker, so every worker and producer in the cluster sees the same
//! numbers.

pub mod failure;
pub mod stat;
pub mod status;

pub use failure::{FailureLog, FailureRecord};
pub use stat::Stat;
pub use status::{StatusRecord, StatusTracker};

#[cfg(test)]
mod tests;
