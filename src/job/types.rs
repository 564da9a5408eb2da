//! Wire-level job records.

use serde::{Deserialize, Serialize};

/// Serialized form of one job as it sits on a queue.
///
/// `args` is a fixed wire convention: always a single-element list holding
/// one argument record (`null` when the producer supplied none). `id` is
/// present only for monitored jobs; an unmonitored job has no queryable
/// status and no id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobPayload {
    pub handler: String,
    pub args: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl JobPayload {
    /// The single argument record, `null` when none was supplied.
    pub fn arg(&self) -> serde_json::Value {
        self.args.first().cloned().unwrap_or(serde_json::Value::Null)
    }
}

/// Lifecycle state of a monitored job.
///
/// Flat enumeration: Queued -> Running -> {Complete | Failed}. Untracked jobs
/// never have a status record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Complete,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The "currently working on" record a worker publishes under its own key
/// while a job is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingOn {
    pub queue: String,
    pub run_at: u64,
    pub payload: JobPayload,
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
