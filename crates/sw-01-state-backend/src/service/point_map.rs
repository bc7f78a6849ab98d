//! # Point Map
//!
//! Typed get/put/delete over one partition, with snapshot-isolated iteration
//! in raw key-byte order.
//!
//! Iteration runs through a [`PointMapScan`], which keeps the engine open
//! while its iterators are alive.

use crate::adapters::rocksdb_options::EngineOptions;
use crate::adapters::serializer::BincodeSerializer;
use crate::domain::errors::{StateError, StateResult};
use crate::domain::keys::CursorPosition;
use crate::ports::outbound::StateSerializer;
use crate::service::partition::{Db, Engine, Partition, StatePartition};
use rocksdb::{DBRawIteratorWithThreadMode, WriteBatch, WriteOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

/// Key-value map backed by a point partition.
///
/// Not synchronized: callers guarantee a single writer per map.
pub struct PointMap<K, V, S = BincodeSerializer> {
    partition: Partition,
    write_opts: WriteOptions,
    serializer: S,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V, S> PointMap<K, V, S> {
    pub(crate) fn new(partition: Partition, write_opts: WriteOptions, serializer: S) -> Self {
        Self {
            partition,
            write_opts,
            serializer,
            _types: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.partition.name()
    }
}

impl<K, V, S> PointMap<K, V, S>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
    S: StateSerializer,
{
    pub fn get(&self, key: &K) -> StateResult<Option<V>> {
        let db = self.partition.engine()?;
        let cf = self.partition.cf(&db)?;
        let key = self.serializer.serialize(key)?;
        let bytes = db
            .get_cf_opt(&cf, key, &EngineOptions::point_read_options())
            .map_err(StateError::io("get"))?;

        bytes
            .map(|bytes| self.serializer.deserialize(&bytes))
            .transpose()
    }

    /// Insert or overwrite.
    pub fn put(&self, key: &K, value: &V) -> StateResult<()> {
        let db = self.partition.engine()?;
        let cf = self.partition.cf(&db)?;
        let key = self.serializer.serialize(key)?;
        let value = self.serializer.serialize(value)?;
        db.put_cf_opt(&cf, key, value, &self.write_opts)
            .map_err(StateError::io("put"))
    }

    pub fn delete(&self, key: &K) -> StateResult<()> {
        let db = self.partition.engine()?;
        let cf = self.partition.cf(&db)?;
        let key = self.serializer.serialize(key)?;
        db.delete_cf_opt(&cf, key, &self.write_opts)
            .map_err(StateError::io("delete"))
    }

    /// Write every entry in one atomic batch.
    pub fn put_all<'a, I>(&self, entries: I) -> StateResult<()>
    where
        I: IntoIterator<Item = (&'a K, &'a V)>,
        K: 'a,
        V: 'a,
    {
        let db = self.partition.engine()?;
        let cf = self.partition.cf(&db)?;
        let mut batch = WriteBatch::default();
        for (key, value) in entries {
            batch.put_cf(
                &cf,
                self.serializer.serialize(key)?,
                self.serializer.serialize(value)?,
            );
        }
        db.write_opt(batch, &self.write_opts)
            .map_err(StateError::io("batch"))
    }

    /// Materialize the whole map. Only for bounded state.
    pub fn get_all(&self) -> StateResult<HashMap<K, V>>
    where
        K: Eq + Hash,
    {
        let scan = self.scan()?;
        let entries = scan.iter()?.collect();
        entries
    }

    /// Pin the engine for iteration.
    pub fn scan(&self) -> StateResult<PointMapScan<'_, K, V, S>> {
        let db = self.partition.engine()?;
        self.partition.cf(&db)?;
        Ok(PointMapScan { db, map: self })
    }
}

impl<K, V, S> StatePartition for PointMap<K, V, S> {
    fn partition(&self) -> &Partition {
        &self.partition
    }
}

impl<K, V, S> std::fmt::Debug for PointMap<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointMap")
            .field("partition", &self.partition)
            .finish_non_exhaustive()
    }
}

/// Open engine for iterating a [`PointMap`].
pub struct PointMapScan<'m, K, V, S> {
    db: Arc<Engine>,
    map: &'m PointMap<K, V, S>,
}

impl<K, V, S> PointMapScan<'_, K, V, S>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
    S: StateSerializer,
{
    /// Iterate over a snapshot taken now. Later writes are not observed.
    pub fn iter(&self) -> StateResult<PointMapIter<'_, K, V, S>> {
        let mut raw = self.raw_iterator()?;
        raw.seek_to_first();
        Ok(PointMapIter::new(raw, &self.map.serializer))
    }

    /// Iterate over the entries strictly after `position`.
    pub fn iter_after(&self, position: &CursorPosition) -> StateResult<PointMapIter<'_, K, V, S>> {
        let mut raw = self.raw_iterator()?;
        raw.seek(position.as_bytes());
        if raw.key() == Some(position.as_bytes()) {
            raw.next();
        }
        Ok(PointMapIter::new(raw, &self.map.serializer))
    }

    fn raw_iterator(&self) -> StateResult<DBRawIteratorWithThreadMode<'_, Db>> {
        let cf = self.map.partition.cf(&self.db)?;
        Ok(self
            .db
            .raw_iterator_cf_opt(&cf, EngineOptions::scan_read_options()))
    }
}

/// Snapshot iterator over a [`PointMap`].
pub struct PointMapIter<'a, K, V, S> {
    raw: DBRawIteratorWithThreadMode<'a, Db>,
    serializer: &'a S,
    last_key: Option<Vec<u8>>,
    done: bool,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<'a, K, V, S> PointMapIter<'a, K, V, S> {
    fn new(raw: DBRawIteratorWithThreadMode<'a, Db>, serializer: &'a S) -> Self {
        Self {
            raw,
            serializer,
            last_key: None,
            done: false,
            _types: PhantomData,
        }
    }

    /// Position of the last entry returned, for `iter_after`.
    pub fn position(&self) -> Option<CursorPosition> {
        self.last_key.clone().map(CursorPosition)
    }
}

impl<K, V, S> Iterator for PointMapIter<'_, K, V, S>
where
    K: DeserializeOwned,
    V: DeserializeOwned,
    S: StateSerializer,
{
    type Item = StateResult<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let (key, value) = match (self.raw.key(), self.raw.value()) {
            (Some(key), Some(value)) if self.raw.valid() => (key, value),
            _ => {
                self.done = true;
                return self
                    .raw
                    .status()
                    .err()
                    .map(|source| Err(StateError::Io {
                        operation: "iterate",
                        source,
                    }));
            }
        };

        let decoded = self
            .serializer
            .deserialize::<K>(key)
            .and_then(|k| Ok((k, self.serializer.deserialize::<V>(value)?)));
        self.last_key = Some(key.to_vec());
        self.raw.next();

        if decoded.is_err() {
            self.done = true;
        }
        Some(decoded)
    }
}
