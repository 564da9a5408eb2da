//! Consistent hash ring over replicated virtual nodes.
//!
//! Each physical shard contributes `replicas` virtual nodes, hashed from
//! `"{endpoint}-{replicaIndex}"`. A key routes to the shard owning the first
//! virtual node at or after the key's own hash, wrapping to the smallest ring
//! entry past the top of the hash space. The whole structure is immutable
//! after construction, so lookups are lock-free and safe from any number of
//! concurrent callers.

use crate::error::{Error, Result};

/// Sorted virtual-node ring mapping byte keys to shard slots.
///
/// Slots are indices into the shard table the caller built the ring from.
/// Same key + same ring membership always yields the same slot; removing one
/// of N shards only remaps the keys that were routed to it.
pub struct HashRing {
    replicas: usize,
    ring: Vec<(u32, usize)>,
}

impl HashRing {
    pub const DEFAULT_REPLICAS: usize = 128;

    /// Build a ring with the default replica count.
    pub fn new(endpoints: &[String]) -> Result<Self> {
        Self::with_replicas(endpoints, Self::DEFAULT_REPLICAS)
    }

    pub fn with_replicas(endpoints: &[String], replicas: usize) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::NoShards);
        }
        let mut ring = Vec::with_capacity(endpoints.len() * replicas);
        for (slot, endpoint) in endpoints.iter().enumerate() {
            for replica in 0..replicas {
                let vnode = format!("{}-{}", endpoint, replica);
                ring.push((crc32c::crc32c(vnode.as_bytes()), slot));
            }
        }
        ring.sort_unstable();
        Ok(Self { replicas, ring })
    }

    /// Route a key to a shard slot. Pure function of ring state.
    pub fn route(&self, key: &[u8]) -> usize {
        self.slot_for_hash(crc32c::crc32c(key))
    }

    /// Upper-bound search: first virtual node whose hash is >= the query,
    /// wrapping to the smallest ring hash when the query exceeds every entry.
    pub(crate) fn slot_for_hash(&self, hash: u32) -> usize {
        let idx = self.ring.partition_point(|&(h, _)| h < hash);
        if idx == self.ring.len() {
            self.ring[0].1
        } else {
            self.ring[idx].1
        }
    }

    /// Largest virtual-node hash on the ring.
    pub(crate) fn max_hash(&self) -> u32 {
        self.ring[self.ring.len() - 1].0
    }

    /// Slot owning the smallest ring hash; the wraparound target.
    pub(crate) fn first_slot(&self) -> usize {
        self.ring[0].1
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Total number of virtual nodes.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
