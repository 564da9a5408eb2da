//! Broker Client Module
//!
//! The queue is built on an external key-value broker with list/set semantics
//! and an atomic pop. This module defines the narrow client interface the rest
//! of the system consumes and the cluster-side routing that spreads commands
//! across multiple broker shards.
//!
//! ## Core Concepts
//! - **Connection**: the `Broker` trait is the full command surface of one
//!   shard (lists, sets, strings, counters, admin). `MemoryBroker` is the
//!   in-process implementation used for embedding and tests.
//! - **HashRing**: consistent hashing over replicated virtual nodes, so that
//!   adding or removing a shard only remaps ~1/N of the keys.
//! - **ClusterRouter**: exposes the same command surface as a single
//!   connection while routing each command either to a fixed default shard
//!   (administrative commands) or to the shard chosen by the ring.

pub mod connection;
pub mod ring;
pub mod router;

pub use connection::{Broker, MemoryBroker};
pub use ring::HashRing;
pub use router::{ClusterRouter, ShardConn};
