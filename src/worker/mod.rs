//! Worker Module
//!
//! A worker is a long-running process that polls a prioritized list of
//! queues, executes reserved jobs, and keeps its presence visible to the
//! rest of the cluster through broker state.
//!
//! ## Core Concepts
//! - **Identity**: workers are named `hostname:pid:queue1,queue2` and
//!   registered in the shared `workers` set; a `*` queue entry resolves to
//!   every live queue, alphabetically, at each poll.
//! - **Isolation**: each job runs in its own spawned task. A handler panic
//!   (or an abort) kills the task, never the worker; the supervising side
//!   records it as a dirty exit.
//! - **Control**: pause/resume/shutdown/reconnect arrive as `ControlSignal`
//!   messages, consumed between polls and while supervising a job. An
//!   optional Unix bridge maps process signals onto the same channel.
//! - **Hygiene**: on startup a worker prunes registrations left behind by
//!   dead processes on its own host.

pub mod control;
pub mod worker;

pub use control::{control_channel, ControlHandle, ControlSignal};
#[cfg(unix)]
pub use control::install_signal_bridge;
pub use worker::{Worker, WORKERS_KEY};
