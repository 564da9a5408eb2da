//! Append-only failure log under the `failed` list key.

use crate::broker::{Broker, ClusterRouter};
use crate::error::Result;
use crate::job::types::{now_ms, JobPayload};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const FAILED_KEY: &str = "failed";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub failed_at: u64,
    pub payload: JobPayload,
    pub error: String,
    pub worker: String,
    pub queue: String,
}

#[derive(Clone)]
pub struct FailureLog {
    router: Arc<ClusterRouter>,
}

impl FailureLog {
    pub fn new(router: Arc<ClusterRouter>) -> Self {
        Self { router }
    }

    /// Append one exception record.
    pub async fn create(
        &self,
        payload: &JobPayload,
        error: &str,
        worker: &str,
        queue: &str,
    ) -> Result<()> {
        let record = FailureRecord {
            failed_at: now_ms(),
            payload: payload.clone(),
            error: error.to_string(),
            worker: worker.to_string(),
            queue: queue.to_string(),
        };
        self.router
            .rpush(FAILED_KEY, &serde_json::to_string(&record)?)
            .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        self.router.llen(FAILED_KEY).await
    }

    /// Every record on the failure list, oldest first.
    pub async fn all(&self) -> Result<Vec<FailureRecord>> {
        self.router
            .lrange(FAILED_KEY, 0, -1)
            .await?
            .iter()
            .map(|serialized| Ok(serde_json::from_str(serialized)?))
            .collect()
    }
}
