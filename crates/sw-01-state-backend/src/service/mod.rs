//! # Service Layer
//!
//! - `handle`: job-scoped engine owner and partition allocator
//! - `scope`: close-exactly-once guard for a job
//! - `partition`: one column family of the shared engine
//! - `point_map`, `prefix_map`: typed maps over partitions

pub mod handle;
pub mod partition;
pub mod point_map;
pub mod prefix_map;
pub mod scope;

pub use handle::StateBackendHandle;
pub use partition::{Db, Engine, Partition, PartitionKind, StatePartition};
pub use point_map::{PointMap, PointMapIter, PointMapScan};
pub use prefix_map::{GroupValues, PrefixCursor, PrefixMultiMap, PrefixScan};
pub use scope::JobStateScope;
