//! # Partitions
//!
//! A partition is one column family of the job's shared engine. Names are
//! allocated by the handle and never reused. The registry holds the names of
//! live partitions: whoever removes a name from it (explicit release, map
//! drop, or handle close) drops the column family, so each partition is
//! dropped exactly once.
//!
//! Partitions hold the engine weakly. Only the handle and in-flight scans
//! keep it alive, so `close()` shuts the engine down even while maps exist.

use crate::domain::errors::{StateError, StateResult};
use crate::domain::metrics::StateMetrics;
use parking_lot::Mutex;
use rocksdb::{BoundColumnFamily, DBWithThreadMode, MultiThreaded};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// The embedded database type.
pub type Db = DBWithThreadMode<MultiThreaded>;

/// Names of live partitions.
pub(crate) type Registry = Arc<Mutex<BTreeSet<String>>>;

/// The open engine shared by every partition of a job.
///
/// Fields drop in order: the database is closed before its directory is
/// removed.
pub struct Engine {
    db: Db,
    directory: DirectoryCleanup,
}

impl Engine {
    pub(crate) fn new(db: Db, directory: PathBuf) -> Self {
        Self {
            db,
            directory: DirectoryCleanup {
                path: directory,
                armed: true,
            },
        }
    }

    /// Close the database, then remove its directory.
    pub(crate) fn shutdown(self) -> StateResult<()> {
        let Engine { db, directory } = self;
        drop(db);
        directory.remove()
    }
}

impl std::ops::Deref for Engine {
    type Target = Db;

    fn deref(&self) -> &Db {
        &self.db
    }
}

/// Removes the job directory when dropped, unless already removed.
struct DirectoryCleanup {
    path: PathBuf,
    armed: bool,
}

impl DirectoryCleanup {
    fn remove(mut self) -> StateResult<()> {
        self.armed = false;
        remove_directory(&self.path)
    }
}

impl Drop for DirectoryCleanup {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match remove_directory(&self.path) {
            Ok(()) => debug!(directory = %self.path.display(), "[sw-01] Removed state directory on deferred shutdown"),
            Err(e) => warn!(error = %e, "[sw-01] Failed to remove state directory"),
        }
    }
}

pub(crate) fn remove_directory(path: &Path) -> StateResult<()> {
    if !path.exists() {
        return Ok(());
    }
    std::fs::remove_dir_all(path).map_err(|source| StateError::Cleanup {
        path: path.to_path_buf(),
        source,
    })
}

/// Partition flavours, used for naming and option selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    Point,
    Prefix,
}

impl PartitionKind {
    pub fn label(&self) -> &'static str {
        match self {
            PartitionKind::Point => "point-map",
            PartitionKind::Prefix => "prefix-map",
        }
    }
}

/// Handle to one logical keyspace inside the shared engine.
pub struct Partition {
    engine: Weak<Engine>,
    name: String,
    kind: PartitionKind,
    registry: Registry,
    metrics: Arc<StateMetrics>,
}

impl Partition {
    pub(crate) fn new(
        engine: &Arc<Engine>,
        name: String,
        kind: PartitionKind,
        registry: Registry,
        metrics: Arc<StateMetrics>,
    ) -> Self {
        Self {
            engine: Arc::downgrade(engine),
            name,
            kind,
            registry,
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PartitionKind {
        self.kind
    }

    /// True once the partition was released or its handle closed.
    pub fn is_released(&self) -> bool {
        !self.registry.lock().contains(&self.name)
    }

    /// The engine, pinned for the duration of one operation or scan.
    pub(crate) fn engine(&self) -> StateResult<Arc<Engine>> {
        self.engine.upgrade().ok_or_else(|| StateError::PartitionReleased {
            name: self.name.clone(),
        })
    }

    pub(crate) fn metrics(&self) -> &StateMetrics {
        &self.metrics
    }

    /// Column family of this partition in `db`, or `PartitionReleased`.
    pub(crate) fn cf<'e>(&self, db: &'e Db) -> StateResult<Arc<BoundColumnFamily<'e>>> {
        db.cf_handle(&self.name)
            .ok_or_else(|| StateError::PartitionReleased {
                name: self.name.clone(),
            })
    }

    /// Drop the column family. Returns false if it was already released.
    pub(crate) fn release(&self) -> StateResult<bool> {
        match self.engine.upgrade() {
            Some(db) => release_partition(&db, &self.registry, &self.name, &self.metrics),
            // Closing the engine dropped every partition.
            None => Ok(self.registry.lock().remove(&self.name)),
        }
    }
}

impl Drop for Partition {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(partition = %self.name, error = %e, "[sw-01] Failed to release partition on drop");
        }
    }
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

pub(crate) fn release_partition(
    db: &Db,
    registry: &Mutex<BTreeSet<String>>,
    name: &str,
    metrics: &StateMetrics,
) -> StateResult<bool> {
    let mut live = registry.lock();
    if !live.remove(name) {
        return Ok(false);
    }
    db.drop_cf(name)
        .map_err(StateError::io("drop partition"))?;
    metrics.record_partition_released();
    debug!(partition = %name, "[sw-01] Released partition");
    Ok(true)
}

/// Anything backed by a partition (point maps, prefix maps).
pub trait StatePartition {
    fn partition(&self) -> &Partition;

    /// Name of the backing partition.
    fn partition_name(&self) -> &str {
        self.partition().name()
    }
}
