//! Core error types for the job queue.

use thiserror::Error;

/// Main error type for queue, routing, and worker operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed job-creation arguments (non-structured args record)
    #[error("invalid job arguments: {0}")]
    Argument(String),

    /// Routing to a shard alias that was never registered
    #[error("unknown shard alias: {0}")]
    AliasNotFound(String),

    /// Job execution cannot resolve its registered handler
    #[error("no handler registered under '{0}'")]
    HandlerNotFound(String),

    /// The job's execution context terminated abnormally; not attributable
    /// to a specific application-level cause
    #[error("dirty exit: {0}")]
    DirtyExit(String),

    /// Broker transport failure
    #[error("broker connection lost: {0}")]
    ConnectionLost(String),

    /// A broker key holds a value of a different kind than the command expects
    #[error("wrong value kind at key '{0}'")]
    WrongKind(String),

    /// Ring construction with zero shards
    #[error("hash ring requires at least one shard")]
    NoShards,

    /// Wire payload encode/decode error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Application-level error raised by a job handler
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
