//! Named counters stored as broker integers under `stat:<name>`.

use crate::broker::{Broker, ClusterRouter};
use crate::error::Result;

use std::sync::Arc;

#[derive(Clone)]
pub struct Stat {
    router: Arc<ClusterRouter>,
}

impl Stat {
    pub fn new(router: Arc<ClusterRouter>) -> Self {
        Self { router }
    }

    fn key(name: &str) -> String {
        format!("stat:{}", name)
    }

    pub async fn incr(&self, name: &str) -> Result<i64> {
        self.router.incr(&Self::key(name)).await
    }

    pub async fn decr(&self, name: &str) -> Result<i64> {
        self.router.decr(&Self::key(name)).await
    }

    /// Current counter value; a counter that was never incremented reads 0.
    pub async fn get(&self, name: &str) -> Result<i64> {
        let value = self.router.get(&Self::key(name)).await?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    pub async fn clear(&self, name: &str) -> Result<()> {
        self.router.del(&Self::key(name)).await?;
        Ok(())
    }
}
