//! # Domain Errors
//!
//! Error types for the state backend.
//!
//! Every storage failure is treated as an unrecoverable local condition (disk
//! full, corruption). Nothing in this crate retries. Write-stall backpressure
//! is not an error: `PrefixMultiMap::add` reports it as `Ok(false)`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the state backend.
#[derive(Debug, Error)]
pub enum StateError {
    /// The job-scoped state directory could not be created.
    #[error("Failed to initialize state directory {path:?}: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The embedded engine refused to open. Fatal for the job.
    #[error("Failed to open storage engine at {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rocksdb::Error,
    },

    /// A read, write, batch, iteration, flush or compaction failed.
    #[error("Storage I/O error during {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: rocksdb::Error,
    },

    /// The partition was released (explicitly, on drop, or by `close()`).
    #[error("Partition {name} has been released")]
    PartitionReleased { name: String },

    /// The engine rejected partition creation.
    #[error("Failed to create partition {name}: {source}")]
    PartitionCreate {
        name: String,
        #[source]
        source: rocksdb::Error,
    },

    /// A partition with a freshly allocated name already exists.
    #[error("Partition {name} already exists")]
    PartitionExists { name: String },

    /// The job-scoped state directory could not be removed on close.
    #[error("Failed to remove state directory {path:?}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The handle has been closed.
    #[error("State backend handle is closed")]
    Closed,

    /// `cursor()` was requested without a `compact()` after the last `add()`.
    #[error("Partition {partition} must be compacted before it can be scanned")]
    NotCompacted { partition: String },

    /// The external serializer failed.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Invalid configuration.
    #[error("Invalid state backend configuration: {0}")]
    Config(String),
}

impl StateError {
    /// Wrap an engine error raised during `operation`.
    pub(crate) fn io(operation: &'static str) -> impl FnOnce(rocksdb::Error) -> Self {
        move |source| StateError::Io { operation, source }
    }

    /// True for the StorageIOError class (including released partitions).
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            StateError::Io { .. } | StateError::PartitionReleased { .. }
        )
    }
}

/// Result type for state backend operations
pub type StateResult<T> = Result<T, StateError>;
