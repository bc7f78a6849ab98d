//! # State Backend (sw-01)
//!
//! Spillable, disk-backed state for dataflow processors whose per-key state
//! outgrows memory. One embedded RocksDB instance per job; every map is a
//! column family ("partition") of that instance.
//!
//! ## Lifecycle
//!
//! ```text
//! JobStateScope ──owns──→ StateBackendHandle ──lazy open──→ RocksDB
//!                               │
//!                               ├── get_map()        → PointMap        (point partition)
//!                               ├── get_prefix_map() → PrefixMultiMap  (prefix partition)
//!                               └── close()          → drop partitions, delete directory
//! ```
//!
//! ## Prefix multimap protocol
//!
//! | Phase | Call | Notes |
//! |-------|------|-------|
//! | Load | `add(k, v) -> bool` | `false` = write stall, retry the same item |
//! | Compact | `compact()` | blocking, once per load |
//! | Scan | `scan()`, `cursor()` | groups in prefix order, values in insertion order |
//!
//! ## Policies
//!
//! - Storage errors are fatal. Nothing retries.
//! - Any operation on a released partition returns
//!   [`StateError::PartitionReleased`].
//! - Single writer per partition; the handle itself is thread-safe.
//!
//! ## Usage
//!
//! ```ignore
//! use sw_01_state_backend::{JobStateScope, StateBackendConfig};
//!
//! let scope = JobStateScope::open(StateBackendConfig::default(), std::env::temp_dir())?;
//! let handle = scope.handle();
//!
//! let mut groups = handle.get_prefix_map::<String, u64>()?;
//! groups.add(&"k1".to_string(), &1)?;
//! groups.compact()?;
//!
//! let scan = groups.scan()?;
//! let mut cursor = scan.cursor()?;
//! while cursor.advance()? {
//!     let total: u64 = cursor.values().sum::<Result<u64, _>>()?;
//! }
//! cursor.close();
//!
//! scope.finish()?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{BincodeSerializer, EngineOptions};
pub use domain::config::{BulkLoadOptions, EngineProfile, PointLookupOptions, StateBackendConfig};
pub use domain::errors::{StateError, StateResult};
pub use domain::keys::{CursorPosition, OrderKey, PrefixMode};
pub use domain::metrics::{MetricsSnapshot, StateMetrics};
pub use ports::StateSerializer;
pub use service::{
    GroupValues, JobStateScope, Partition, PartitionKind, PointMap, PointMapIter, PointMapScan,
    PrefixCursor, PrefixMultiMap, PrefixScan, StateBackendHandle, StatePartition,
};
