//! # State Backend Handle
//!
//! One embedded engine per job. The handle owns the job directory, opens the
//! engine lazily, allocates partitions under never-reused names and tears
//! everything down exactly once on `close()`.

use crate::adapters::rocksdb_options::EngineOptions;
use crate::adapters::serializer::BincodeSerializer;
use crate::domain::config::StateBackendConfig;
use crate::domain::errors::{StateError, StateResult};
use crate::domain::keys::{OrderKey, PrefixMode};
use crate::domain::metrics::{MetricsSnapshot, StateMetrics};
use crate::ports::outbound::StateSerializer;
use crate::service::partition::{
    remove_directory, Db, Engine, Partition, PartitionKind, Registry, StatePartition,
};
use crate::service::point_map::PointMap;
use crate::service::prefix_map::PrefixMultiMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Job-scoped owner of the embedded engine.
///
/// Shared between co-located processors behind an `Arc`. All methods take
/// `&self`; `open()` and partition allocation are thread-safe.
pub struct StateBackendHandle {
    directory: PathBuf,
    options: EngineOptions,
    db: Mutex<Option<Arc<Engine>>>,
    registry: Registry,
    counter: AtomicU64,
    closed: AtomicBool,
    metrics: Arc<StateMetrics>,
}

impl StateBackendHandle {
    /// Create the job directory `<base_dir>/<prefix>-<uuid>`.
    ///
    /// The engine itself is not opened until the first `open()` or
    /// allocation.
    pub fn initialize(config: StateBackendConfig, base_dir: impl AsRef<Path>) -> StateResult<Self> {
        config.validate()?;

        let directory = base_dir
            .as_ref()
            .join(format!("{}-{}", config.directory_prefix, Uuid::new_v4()));
        std::fs::create_dir_all(&directory).map_err(|source| StateError::Init {
            path: directory.clone(),
            source,
        })?;

        info!(
            directory = %directory.display(),
            profile = ?config.profile,
            "[sw-01] Initialized state directory"
        );

        Ok(Self {
            directory,
            options: EngineOptions::new(config),
            db: Mutex::new(None),
            registry: Arc::new(Mutex::new(BTreeSet::new())),
            counter: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            metrics: Arc::new(StateMetrics::new()),
        })
    }

    /// Open the engine. Idempotent; concurrent callers share one open.
    pub fn open(&self) -> StateResult<()> {
        self.engine().map(|_| ())
    }

    fn engine(&self) -> StateResult<Arc<Engine>> {
        let mut guard = self.db.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(StateError::Closed);
        }
        if let Some(db) = guard.as_ref() {
            return Ok(Arc::clone(db));
        }

        let db = Db::open(&self.options.db_options(), &self.directory).map_err(|source| {
            StateError::Open {
                path: self.directory.clone(),
                source,
            }
        })?;
        let db = Arc::new(Engine::new(db, self.directory.clone()));
        *guard = Some(Arc::clone(&db));

        info!(directory = %self.directory.display(), "[sw-01] Opened storage engine");
        Ok(db)
    }

    fn allocate(&self, kind: PartitionKind) -> StateResult<Partition> {
        let db = self.engine()?;
        let name = format!(
            "{}-{}",
            kind.label(),
            self.counter.fetch_add(1, Ordering::SeqCst)
        );

        let mut live = self.registry.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(StateError::Closed);
        }
        if db.cf_handle(&name).is_some() {
            return Err(StateError::PartitionExists { name });
        }

        let opts = match kind {
            PartitionKind::Point => self.options.point_partition_options(),
            PartitionKind::Prefix => self.options.prefix_partition_options(),
        };
        db.create_cf(&name, &opts)
            .map_err(|source| StateError::PartitionCreate {
                name: name.clone(),
                source,
            })?;
        live.insert(name.clone());
        drop(live);

        self.metrics.record_partition_created();
        debug!(partition = %name, "[sw-01] Created partition");

        Ok(Partition::new(
            &db,
            name,
            kind,
            Arc::clone(&self.registry),
            Arc::clone(&self.metrics),
        ))
    }

    /// New point map using the default serializer.
    pub fn get_map<K, V>(&self) -> StateResult<PointMap<K, V>> {
        self.get_map_with(BincodeSerializer)
    }

    /// New point map using a caller-supplied serializer.
    pub fn get_map_with<K, V, S: StateSerializer>(&self, serializer: S) -> StateResult<PointMap<K, V, S>> {
        let partition = self.allocate(PartitionKind::Point)?;
        Ok(PointMap::new(
            partition,
            self.options.point_write_options(),
            serializer,
        ))
    }

    /// New multi-value prefix map using the default serializer.
    pub fn get_prefix_map<K, V>(&self) -> StateResult<PrefixMultiMap<K, V>> {
        self.get_prefix_map_with(PrefixMode::MultiValue, BincodeSerializer)
    }

    pub fn get_prefix_map_with<K, V, S: StateSerializer>(
        &self,
        mode: PrefixMode,
        serializer: S,
    ) -> StateResult<PrefixMultiMap<K, V, S>> {
        let partition = self.allocate(PartitionKind::Prefix)?;
        Ok(PrefixMultiMap::new(
            partition,
            self.options.prefix_write_options(),
            mode,
            serializer,
        ))
    }

    /// New single-value prefix map keyed by [`OrderKey`], for external sorting.
    pub fn get_sorted_map<V>(&self) -> StateResult<PrefixMultiMap<OrderKey, V>> {
        self.get_prefix_map_with(PrefixMode::SingleValue, BincodeSerializer)
    }

    /// Drop the partition behind `map` now. Idempotent.
    pub fn release(&self, map: &impl StatePartition) -> StateResult<()> {
        map.partition().release().map(|_| ())
    }

    /// Names of the partitions that are currently live.
    pub fn live_partitions(&self) -> Vec<String> {
        self.registry.lock().iter().cloned().collect()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &StateBackendConfig {
        self.options.config()
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_open(&self) -> bool {
        self.db.lock().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Drop every live partition, close the engine and delete the job
    /// directory. Only the first call does any work.
    ///
    /// Maps that outlive the handle fail with `PartitionReleased` from then
    /// on. A scan still running on another thread keeps the engine open
    /// until it ends; the directory goes with it. Teardown continues past
    /// individual failures; the first error is returned.
    pub fn close(&self) -> StateResult<()> {
        let db = {
            let mut guard = self.db.lock();
            if self.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            guard.take()
        };

        let mut first_error = None;

        match db {
            Some(db) => {
                let names = std::mem::take(&mut *self.registry.lock());
                for name in &names {
                    match db.drop_cf(name) {
                        Ok(()) => self.metrics.record_partition_released(),
                        Err(source) => {
                            warn!(partition = %name, error = %source, "[sw-01] Failed to drop partition on close");
                            first_error.get_or_insert(StateError::Io {
                                operation: "drop partition",
                                source,
                            });
                        }
                    }
                }

                match Arc::try_unwrap(db) {
                    Ok(engine) => {
                        if let Err(e) = engine.shutdown() {
                            first_error.get_or_insert(e);
                        }
                    }
                    Err(engine) => {
                        engine.cancel_all_background_work(true);
                        warn!(
                            scans = Arc::strong_count(&engine) - 1,
                            "[sw-01] Closing handle during active scans, engine shutdown deferred"
                        );
                    }
                }
            }
            None => {
                if let Err(e) = remove_directory(&self.directory) {
                    first_error.get_or_insert(e);
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        info!(
            directory = %self.directory.display(),
            partitions_created = snapshot.partitions_created,
            compactions = snapshot.compactions,
            "[sw-01] Closed state backend"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for StateBackendHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "[sw-01] Failed to close state backend on drop");
        }
    }
}

impl std::fmt::Debug for StateBackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateBackendHandle")
            .field("directory", &self.directory)
            .field("open", &self.is_open())
            .field("closed", &self.is_closed())
            .finish()
    }
}
