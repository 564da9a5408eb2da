//! Distributed Job Queue Library
//!
//! This library crate defines the core modules of the job queue. It serves as
//! the foundation for the binary executable (`main.rs`) and for embedders
//! running producers or workers inside their own processes.
//!
//! ## Architecture Modules
//! The system is composed of five loosely coupled subsystems:
//!
//! - **`broker`**: The shared state layer. A narrow client trait over a
//!   key-value broker with list/set semantics, an in-memory implementation,
//!   and consistent-hash routing of commands across named shard connections.
//! - **`job`**: The job protocol. Creation with argument validation,
//!   atomic-pop reservation, handler resolution through a registry, and the
//!   setup/perform/teardown execution lifecycle.
//! - **`worker`**: The processing engine. Long-running pollers that reserve
//!   jobs in priority order, execute each one in an isolated task, and react
//!   to an explicit pause/resume/shutdown control channel.
//! - **`tracker`**: The bookkeeping layer. Named statistics counters,
//!   per-job status records, and the failure log, all stored in the broker
//!   so every process in the cluster sees the same numbers.
//! - **`events`**: Extension points. Lifecycle notifications around dispatch
//!   and execution for metrics or plugins.

pub mod broker;
pub mod error;
pub mod events;
pub mod job;
pub mod tracker;
pub mod worker;

pub use error::{Error, Result};
