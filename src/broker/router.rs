//! Cluster routing across named broker shards.
//!
//! `ClusterRouter` exposes the same command surface as a single broker
//! connection. Administrative commands with cluster-wide or connection-local
//! semantics always go to a designated default shard; everything else is
//! hashed on the command's first argument through the ring. There is no retry
//! and no failover: if a shard is down, commands for keys hashed to it fail
//! with that shard's error.

use super::connection::Broker;
use super::ring::HashRing;
use crate::error::{Error, Result};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Commands that are never hashed: per-key routing is meaningless or unsafe
/// for them, so they are pinned to the default shard.
pub const SINGLE_SHARD_COMMANDS: &[&str] = &[
    "flushall", "save", "info", "select", "monitor", "move", "randomkey", "dbsize", "lastsave",
    "shutdown", "slaveof",
];

/// One registered shard: a human-readable alias plus its connection.
pub struct ShardConn {
    pub alias: String,
    pub endpoint: String,
    pub conn: Arc<dyn Broker>,
}

impl ShardConn {
    pub fn new(alias: impl Into<String>, conn: Arc<dyn Broker>) -> Self {
        let endpoint = conn.endpoint().to_string();
        Self {
            alias: alias.into(),
            endpoint,
            conn,
        }
    }
}

/// Router over a fixed set of shard connections.
///
/// Membership is immutable after construction; the ring and alias table are
/// therefore safely read by any number of concurrent callers without locking.
pub struct ClusterRouter {
    shards: Vec<ShardConn>,
    by_alias: HashMap<String, usize>,
    ring: HashRing,
    default_slot: usize,
}

impl ClusterRouter {
    /// Build a router; the first registered shard is the default shard for
    /// single-shard commands.
    pub fn new(shards: Vec<ShardConn>) -> Result<Arc<Self>> {
        let endpoints: Vec<String> = shards.iter().map(|s| s.endpoint.clone()).collect();
        let ring = HashRing::new(&endpoints)?;
        let by_alias = shards
            .iter()
            .enumerate()
            .map(|(slot, shard)| (shard.alias.clone(), slot))
            .collect();
        tracing::info!("Cluster router over {} shard(s)", shards.len());
        Ok(Arc::new(Self {
            shards,
            by_alias,
            ring,
            default_slot: 0,
        }))
    }

    /// Convenience constructor for the common single-shard deployment.
    pub fn single(alias: impl Into<String>, conn: Arc<dyn Broker>) -> Arc<Self> {
        Self::new(vec![ShardConn::new(alias, conn)])
            .expect("single shard ring construction cannot fail")
    }

    /// Direct addressing by alias, bypassing the ring entirely.
    pub fn to(&self, alias: &str) -> Result<Arc<dyn Broker>> {
        match self.by_alias.get(alias) {
            Some(&slot) => Ok(self.shards[slot].conn.clone()),
            None => Err(Error::AliasNotFound(alias.to_string())),
        }
    }

    /// Shard a command will be sent to: the default shard for commands on the
    /// single-shard list, the ring's choice for everything else.
    pub fn shard_for(&self, command: &str, key: &str) -> &ShardConn {
        if SINGLE_SHARD_COMMANDS.contains(&command) {
            &self.shards[self.default_slot]
        } else {
            &self.shards[self.ring.route(key.as_bytes())]
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn default_shard(&self) -> &ShardConn {
        &self.shards[self.default_slot]
    }

    /// One reconnect attempt per shard; the first failure propagates.
    pub async fn reconnect_all(&self) -> Result<()> {
        for shard in &self.shards {
            shard.conn.reconnect().await?;
        }
        Ok(())
    }

    fn conn_for(&self, command: &str, key: &str) -> &Arc<dyn Broker> {
        &self.shard_for(command, key).conn
    }
}

#[async_trait]
impl Broker for ClusterRouter {
    async fn rpush(&self, key: &str, value: &str) -> Result<u64> {
        self.conn_for("rpush", key).rpush(key, value).await
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>> {
        self.conn_for("lpop", key).lpop(key).await
    }

    async fn llen(&self, key: &str) -> Result<u64> {
        self.conn_for("llen", key).llen(key).await
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.conn_for("lrange", key).lrange(key, start, stop).await
    }

    async fn blpop(&self, keys: &[String], timeout: Duration) -> Result<Option<(String, String)>> {
        // Blocking pops are routed on the first key, like any other command.
        let Some(first) = keys.first() else {
            return Ok(None);
        };
        self.conn_for("blpop", first).blpop(keys, timeout).await
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        self.conn_for("sadd", key).sadd(key, member).await
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool> {
        self.conn_for("srem", key).srem(key, member).await
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        self.conn_for("sismember", key).sismember(key, member).await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.conn_for("smembers", key).smembers(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn_for("get", key).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn_for("set", key).set(key, value).await
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.conn_for("del", key).del(key).await
    }

    async fn incrby(&self, key: &str, delta: i64) -> Result<i64> {
        self.conn_for("incrby", key).incrby(key, delta).await
    }

    async fn flushall(&self) -> Result<()> {
        self.conn_for("flushall", "").flushall().await
    }

    async fn dbsize(&self) -> Result<u64> {
        self.conn_for("dbsize", "").dbsize().await
    }

    async fn info(&self) -> Result<String> {
        self.conn_for("info", "").info().await
    }

    async fn ping(&self) -> Result<()> {
        for shard in &self.shards {
            shard.conn.ping().await?;
        }
        Ok(())
    }

    async fn reconnect(&self) -> Result<()> {
        self.reconnect_all().await
    }

    fn endpoint(&self) -> &str {
        &self.shards[self.default_slot].endpoint
    }
}
