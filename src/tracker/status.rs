//! Per-job status records under `status:<id>`.
//!
//! Only monitored jobs have a record; a job that was never tracked has no
//! queryable status. Records are meaningful only while tracked — `clear`
//! expires them.

use crate::broker::{Broker, ClusterRouter};
use crate::error::Result;
use crate::job::types::{now_ms, JobStatus};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: JobStatus,
    pub updated_at: u64,
}

#[derive(Clone)]
pub struct StatusTracker {
    router: Arc<ClusterRouter>,
}

impl StatusTracker {
    pub fn new(router: Arc<ClusterRouter>) -> Self {
        Self { router }
    }

    fn key(id: &str) -> String {
        format!("status:{}", id)
    }

    async fn write(&self, id: &str, status: JobStatus) -> Result<()> {
        let record = StatusRecord {
            status,
            updated_at: now_ms(),
        };
        self.router
            .set(&Self::key(id), &serde_json::to_string(&record)?)
            .await
    }

    /// Start tracking a job in the initial Queued state.
    pub async fn create(&self, id: &str) -> Result<()> {
        self.write(id, JobStatus::Queued).await
    }

    pub async fn update(&self, id: &str, status: JobStatus) -> Result<()> {
        self.write(id, status).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<JobStatus>> {
        Ok(self.record(id).await?.map(|r| r.status))
    }

    pub async fn record(&self, id: &str) -> Result<Option<StatusRecord>> {
        match self.router.get(&Self::key(id)).await? {
            Some(serialized) => Ok(Some(serde_json::from_str(&serialized)?)),
            None => Ok(None),
        }
    }

    pub async fn is_tracking(&self, id: &str) -> Result<bool> {
        Ok(self.record(id).await?.is_some())
    }

    /// Expire a tracking record. Returns true when one existed.
    pub async fn clear(&self, id: &str) -> Result<bool> {
        self.router.del(&Self::key(id)).await
    }
}
