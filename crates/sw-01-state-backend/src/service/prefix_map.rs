//! # Prefix Multimap
//!
//! Append-only multimap over a prefix partition. Use follows three phases:
//!
//! 1. **Load**: `add()` appends without WAL and without waiting on write
//!    pressure. A stall comes back as `Ok(false)`; retry the same item later.
//! 2. **Compact**: `compact()` flushes the memtables and rewrites the partition
//!    so every group is contiguous on disk. Blocking, at most once per load.
//! 3. **Scan**: `scan()` pins the engine; its `cursor()` walks groups in
//!    prefix order. Each group exposes its key and a lazy pass over its
//!    values in insertion order.

use crate::adapters::rocksdb_options::EngineOptions;
use crate::adapters::serializer::BincodeSerializer;
use crate::domain::errors::{StateError, StateResult};
use crate::domain::keys::{entry_key, split_group, CursorPosition, PrefixMode};
use crate::ports::outbound::StateSerializer;
use crate::service::partition::{Db, Engine, Partition, StatePartition};
use rocksdb::{DBRawIteratorWithThreadMode, ErrorKind, WriteOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Multimap backed by a prefix partition.
pub struct PrefixMultiMap<K, V, S = BincodeSerializer> {
    partition: Partition,
    write_opts: WriteOptions,
    mode: PrefixMode,
    next_sequence: u64,
    compacted: bool,
    serializer: S,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V, S> PrefixMultiMap<K, V, S> {
    pub(crate) fn new(
        partition: Partition,
        write_opts: WriteOptions,
        mode: PrefixMode,
        serializer: S,
    ) -> Self {
        Self {
            partition,
            write_opts,
            mode,
            next_sequence: 0,
            compacted: false,
            serializer,
            _types: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.partition.name()
    }

    pub fn mode(&self) -> PrefixMode {
        self.mode
    }

    /// True if `compact()` ran after the last successful `add()`.
    pub fn is_compacted(&self) -> bool {
        self.compacted
    }
}

impl<K, V, S> PrefixMultiMap<K, V, S>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
    S: StateSerializer,
{
    /// Append `value` under `key`.
    ///
    /// Returns `Ok(false)` when the engine rejected the write under write
    /// pressure. Nothing was stored; the caller retries the same item.
    pub fn add(&mut self, key: &K, value: &V) -> StateResult<bool> {
        let db = self.partition.engine()?;
        let cf = self.partition.cf(&db)?;
        let key_bytes = self.serializer.serialize(key)?;
        let value_bytes = self.serializer.serialize(value)?;
        let raw = entry_key(&key_bytes, self.mode, self.next_sequence);

        match db.put_cf_opt(&cf, raw, value_bytes, &self.write_opts) {
            Ok(()) => {
                self.next_sequence += 1;
                self.compacted = false;
                self.partition.metrics().record_append(true);
                Ok(true)
            }
            Err(e) if is_write_stall(&e) => {
                self.partition.metrics().record_append(false);
                Ok(false)
            }
            Err(source) => Err(StateError::Io {
                operation: "add",
                source,
            }),
        }
    }

    /// Flush and fully compact the partition. No-op if already compacted.
    pub fn compact(&mut self) -> StateResult<()> {
        if self.compacted {
            return Ok(());
        }

        let started = Instant::now();
        let db = self.partition.engine()?;
        let cf = self.partition.cf(&db)?;
        db.flush_cf_opt(&cf, &EngineOptions::flush_options())
            .map_err(StateError::io("flush"))?;
        // The binding reports no status. A failed compaction leaves the data
        // readable but unmerged; read errors surface through the cursor's
        // iterator status instead.
        db.compact_range_cf_opt(
            &cf,
            None::<&[u8]>,
            None::<&[u8]>,
            &EngineOptions::compact_options(),
        );

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.partition.metrics().record_compaction(elapsed_ms);
        self.compacted = true;
        debug!(
            partition = %self.partition.name(),
            entries = self.next_sequence,
            elapsed_ms,
            "[sw-01] Compacted prefix partition"
        );
        Ok(())
    }

    /// Pin the engine for scanning. Fails with `NotCompacted` unless
    /// `compact()` ran after the last `add()`.
    pub fn scan(&self) -> StateResult<PrefixScan<'_, K, V, S>> {
        let db = self.partition.engine()?;
        self.partition.cf(&db)?;
        if !self.compacted {
            return Err(StateError::NotCompacted {
                partition: self.partition.name().to_string(),
            });
        }
        Ok(PrefixScan { db, map: self })
    }
}

/// Open engine for scanning a compacted [`PrefixMultiMap`].
pub struct PrefixScan<'m, K, V, S> {
    db: Arc<Engine>,
    map: &'m PrefixMultiMap<K, V, S>,
}

impl<K, V, S> PrefixScan<'_, K, V, S> {
    /// Cursor positioned before the first group.
    pub fn cursor(&self) -> StateResult<PrefixCursor<'_, K, V, S>> {
        let mut raw = self.raw_iterator()?;
        raw.seek_to_first();
        Ok(PrefixCursor::new(
            raw,
            &self.map.serializer,
            self.map.partition.name(),
            None,
        ))
    }

    /// Cursor positioned after the group at `position`.
    ///
    /// The first `advance()` lands on the group following the one that was
    /// current when `position` was taken.
    pub fn cursor_after(&self, position: &CursorPosition) -> StateResult<PrefixCursor<'_, K, V, S>> {
        let mut raw = self.raw_iterator()?;
        raw.seek(position.as_bytes());
        Ok(PrefixCursor::new(
            raw,
            &self.map.serializer,
            self.map.partition.name(),
            Some(position.as_bytes().to_vec()),
        ))
    }

    fn raw_iterator(&self) -> StateResult<DBRawIteratorWithThreadMode<'_, Db>> {
        let cf = self.map.partition.cf(&self.db)?;
        Ok(self
            .db
            .raw_iterator_cf_opt(&cf, EngineOptions::scan_read_options()))
    }
}

fn is_write_stall(e: &rocksdb::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::Incomplete | ErrorKind::TryAgain | ErrorKind::Busy
    )
}

impl<K, V, S> StatePartition for PrefixMultiMap<K, V, S> {
    fn partition(&self) -> &Partition {
        &self.partition
    }
}

impl<K, V, S> std::fmt::Debug for PrefixMultiMap<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixMultiMap")
            .field("partition", &self.partition)
            .field("mode", &self.mode)
            .field("entries", &self.next_sequence)
            .field("compacted", &self.compacted)
            .finish()
    }
}

/// Grouping cursor over a compacted [`PrefixMultiMap`].
///
/// Holds an engine iterator (and its implicit snapshot) until dropped or
/// closed.
pub struct PrefixCursor<'a, K, V, S> {
    raw: DBRawIteratorWithThreadMode<'a, Db>,
    serializer: &'a S,
    partition: &'a str,
    current_prefix: Option<Vec<u8>>,
    current_key: Option<K>,
    exhausted: bool,
    _values: PhantomData<fn() -> V>,
}

impl<'a, K, V, S> PrefixCursor<'a, K, V, S> {
    fn new(
        raw: DBRawIteratorWithThreadMode<'a, Db>,
        serializer: &'a S,
        partition: &'a str,
        resume_prefix: Option<Vec<u8>>,
    ) -> Self {
        Self {
            raw,
            serializer,
            partition,
            current_prefix: resume_prefix,
            current_key: None,
            exhausted: false,
            _values: PhantomData,
        }
    }

    /// Key of the current group.
    pub fn key(&self) -> Option<&K> {
        self.current_key.as_ref()
    }

    /// Resume point: the current group. `cursor_after` continues past it.
    pub fn position(&self) -> Option<CursorPosition> {
        self.current_key.as_ref()?;
        self.current_prefix.clone().map(CursorPosition)
    }

    /// Release the engine iterator.
    pub fn close(self) {
        debug!(partition = %self.partition, "[sw-01] Closed prefix cursor");
    }

    fn skip_current_group(&mut self) {
        let Some(prefix) = &self.current_prefix else {
            return;
        };
        while self.raw.valid() && self.raw.key().is_some_and(|k| k.starts_with(prefix)) {
            self.raw.next();
        }
    }
}

impl<'a, K, V, S> PrefixCursor<'a, K, V, S>
where
    K: DeserializeOwned,
    V: DeserializeOwned,
    S: StateSerializer,
{
    /// Move to the next group. Returns false once every group was visited.
    ///
    /// Unread values of the current group are skipped.
    pub fn advance(&mut self) -> StateResult<bool> {
        if self.exhausted {
            return Ok(false);
        }
        self.skip_current_group();

        let raw_key = match self.raw.key() {
            Some(raw_key) if self.raw.valid() => raw_key,
            _ => {
                self.exhausted = true;
                self.current_prefix = None;
                self.current_key = None;
                self.raw.status().map_err(StateError::io("cursor advance"))?;
                return Ok(false);
            }
        };

        let (prefix, key_bytes) =
            split_group(raw_key).ok_or_else(|| StateError::Serialization {
                message: format!("malformed prefix key in partition {}", self.partition),
            })?;
        let key = self.serializer.deserialize(key_bytes)?;
        self.current_prefix = Some(prefix.to_vec());
        self.current_key = Some(key);
        Ok(true)
    }

    /// Lazy single pass over the current group's values, in insertion order.
    pub fn values(&mut self) -> GroupValues<'_, 'a, K, V, S> {
        GroupValues { cursor: self }
    }
}

/// Values of the group a [`PrefixCursor`] currently points at.
pub struct GroupValues<'c, 'a, K, V, S> {
    cursor: &'c mut PrefixCursor<'a, K, V, S>,
}

impl<K, V, S> Iterator for GroupValues<'_, '_, K, V, S>
where
    V: DeserializeOwned,
    S: StateSerializer,
{
    type Item = StateResult<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = &mut *self.cursor;
        cursor.current_key.as_ref()?;
        let prefix = cursor.current_prefix.as_ref()?;

        if !cursor.raw.valid() {
            return cursor
                .raw
                .status()
                .err()
                .map(|source| Err(StateError::Io {
                    operation: "cursor read",
                    source,
                }));
        }

        let value = match (cursor.raw.key(), cursor.raw.value()) {
            (Some(raw_key), Some(value)) if raw_key.starts_with(prefix) => {
                cursor.serializer.deserialize(value)
            }
            _ => return None,
        };
        cursor.raw.next();
        Some(value)
    }
}
