//! # Accumulator Store
//!
//! Per-key accumulator state behind one interface, with the backend chosen at
//! runtime from [`StateBackendKind`]:
//!
//! | Backend | Insert | Drain |
//! |---------|--------|-------|
//! | `InMemory` | fold into `HashMap` entry | move out of the map |
//! | `Persisted` | point get, fold, put | snapshot scan of the point map |
//! | `PersistedUnbounded` | append `(ordinal, item)` | compact, then fold each group |
//!
//! Draining is resumable: a paused drain records where it stopped and the
//! next call continues from there.

use crate::domain::aggregate::CreateFn;
use crate::domain::errors::{ProcessorError, ProcessorResult};
use crate::domain::types::{StateBackendKind, StateKey, StateValue};
use std::collections::hash_map;
use std::collections::HashMap;
use std::sync::Arc;
use sw_01_state_backend::{CursorPosition, PointMap, PrefixMultiMap, StateBackendHandle};

/// Folds one item from input `ordinal` into an accumulator.
pub type FoldFn<T, A> = Arc<dyn Fn(usize, &mut A, &T) -> ProcessorResult<()> + Send + Sync>;

enum Backend<K, T, A> {
    Memory {
        accumulators: HashMap<K, A>,
        drain: Option<hash_map::IntoIter<K, A>>,
    },
    Point {
        map: PointMap<K, A>,
        position: Option<CursorPosition>,
    },
    Unbounded {
        map: PrefixMultiMap<K, (usize, T)>,
        position: Option<CursorPosition>,
    },
    Released,
}

/// Keyed accumulator state of one processor instance.
pub struct AccumulatorStore<K, T, A> {
    kind: StateBackendKind,
    backend: Backend<K, T, A>,
    create: CreateFn<A>,
    fold: FoldFn<T, A>,
}

impl<K, T, A> AccumulatorStore<K, T, A>
where
    K: StateKey,
    T: StateValue,
    A: StateValue,
{
    /// Allocate the backend. Persisted kinds take a fresh partition of `state`.
    pub fn new(
        kind: StateBackendKind,
        state: &StateBackendHandle,
        create: CreateFn<A>,
        fold: FoldFn<T, A>,
    ) -> ProcessorResult<Self> {
        let backend = match kind {
            StateBackendKind::InMemory => Backend::Memory {
                accumulators: HashMap::new(),
                drain: None,
            },
            StateBackendKind::Persisted => Backend::Point {
                map: state.get_map()?,
                position: None,
            },
            StateBackendKind::PersistedUnbounded => Backend::Unbounded {
                map: state.get_prefix_map()?,
                position: None,
            },
        };

        Ok(Self {
            kind,
            backend,
            create,
            fold,
        })
    }

    pub fn kind(&self) -> StateBackendKind {
        self.kind
    }

    /// Add `item` under `key`. `Ok(false)` is backpressure from the engine.
    pub fn insert(&mut self, ordinal: usize, key: K, item: &T) -> ProcessorResult<bool> {
        let Self {
            backend,
            create,
            fold,
            ..
        } = self;

        match backend {
            Backend::Memory {
                accumulators,
                drain: None,
            } => {
                let acc = accumulators.entry(key).or_insert_with(|| create());
                fold(ordinal, acc, item)?;
                Ok(true)
            }
            Backend::Point { map, .. } => {
                let mut acc = match map.get(&key)? {
                    Some(acc) => acc,
                    None => create(),
                };
                fold(ordinal, &mut acc, item)?;
                map.put(&key, &acc)?;
                Ok(true)
            }
            Backend::Unbounded { map, .. } => Ok(map.add(&key, &(ordinal, item.clone()))?),
            Backend::Memory { drain: Some(_), .. } | Backend::Released => Err(
                ProcessorError::InvalidOperation("insert after draining started".to_string()),
            ),
        }
    }

    /// Hand finished `(key, accumulator)` pairs to `sink` until it returns
    /// false or the store is empty.
    ///
    /// Returns true once every key was handed out. The pair that made `sink`
    /// return false counts as handed out.
    pub fn drain(&mut self, mut sink: impl FnMut(K, A) -> bool) -> ProcessorResult<bool> {
        let Self {
            backend,
            create,
            fold,
            ..
        } = self;

        match backend {
            Backend::Memory {
                accumulators,
                drain,
            } => {
                let entries = drain.get_or_insert_with(|| std::mem::take(accumulators).into_iter());
                for (key, acc) in entries {
                    if !sink(key, acc) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Backend::Point { map, position } => {
                let scan = map.scan()?;
                let mut entries = match position.as_ref() {
                    Some(position) => scan.iter_after(position)?,
                    None => scan.iter()?,
                };
                while let Some(entry) = entries.next() {
                    let (key, acc) = entry?;
                    *position = entries.position();
                    if !sink(key, acc) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Backend::Unbounded { map, position } => {
                map.compact()?;
                let scan = map.scan()?;
                let mut cursor = match position.as_ref() {
                    Some(position) => scan.cursor_after(position)?,
                    None => scan.cursor()?,
                };
                while cursor.advance()? {
                    let Some(key) = cursor.key().cloned() else {
                        break;
                    };
                    let mut acc = create();
                    for entry in cursor.values() {
                        let (ordinal, item) = entry?;
                        fold(ordinal, &mut acc, &item)?;
                    }
                    *position = cursor.position();
                    if !sink(key, acc) {
                        return Ok(false);
                    }
                }
                cursor.close();
                Ok(true)
            }
            Backend::Released => Ok(true),
        }
    }

    /// Drop the backing partition, if any.
    pub fn release(&mut self) {
        self.backend = Backend::Released;
    }
}

impl<K, T, A> std::fmt::Debug for AccumulatorStore<K, T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            Backend::Memory { accumulators, .. } => format!("memory({} keys)", accumulators.len()),
            Backend::Point { map, .. } => format!("point({})", map.name()),
            Backend::Unbounded { map, .. } => format!("prefix({})", map.name()),
            Backend::Released => "released".to_string(),
        };
        f.debug_struct("AccumulatorStore")
            .field("kind", &self.kind)
            .field("backend", &backend)
            .finish()
    }
}
