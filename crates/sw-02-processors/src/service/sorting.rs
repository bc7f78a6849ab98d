//! # Sorting Processor
//!
//! Buffers items under a 64-bit order key and emits them in ascending key
//! order once input is exhausted. Duplicate keys collapse to the last item.
//!
//! Each instance produces one sorted run; an external merge stage combines
//! the runs of all instances.

use crate::domain::errors::{ProcessorError, ProcessorResult};
use crate::domain::types::{OrderFn, StateValue};
use crate::ports::processor::{Outbox, Processor, ProcessorContext};
use std::collections::BTreeMap;
use sw_01_state_backend::{CursorPosition, OrderKey, PrefixMultiMap, StateBackendHandle};
use tracing::{debug, info};

/// Storage for buffered items, selected per instance.
pub enum SortBackend<T> {
    /// Ordered map in memory. Only for memory-resident state.
    InMemory { items: BTreeMap<i64, T> },
    /// Single-value prefix map keyed by [`OrderKey`].
    Persisted {
        map: PrefixMultiMap<OrderKey, T>,
        position: Option<CursorPosition>,
    },
}

impl<T: StateValue> SortBackend<T> {
    pub fn in_memory() -> Self {
        SortBackend::InMemory {
            items: BTreeMap::new(),
        }
    }

    pub fn persisted(state: &StateBackendHandle) -> ProcessorResult<Self> {
        Ok(SortBackend::Persisted {
            map: state.get_sorted_map()?,
            position: None,
        })
    }

    pub fn select(state: &StateBackendHandle, use_persistence: bool) -> ProcessorResult<Self> {
        if use_persistence {
            Self::persisted(state)
        } else {
            Ok(Self::in_memory())
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, SortBackend::Persisted { .. })
    }

    fn insert(&mut self, key: i64, item: &T) -> ProcessorResult<bool> {
        match self {
            SortBackend::InMemory { items } => {
                items.insert(key, item.clone());
                Ok(true)
            }
            SortBackend::Persisted { map, .. } => Ok(map.add(&OrderKey::new(key), item)?),
        }
    }

    /// Hand items to `sink` in key order until it returns false. Returns true
    /// once every item was handed out.
    fn drain(&mut self, mut sink: impl FnMut(T) -> bool) -> ProcessorResult<bool> {
        match self {
            SortBackend::InMemory { items } => {
                while let Some((_, item)) = items.pop_first() {
                    if !sink(item) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            SortBackend::Persisted { map, position } => {
                map.compact()?;
                let scan = map.scan()?;
                let mut cursor = match position.as_ref() {
                    Some(position) => scan.cursor_after(position)?,
                    None => scan.cursor()?,
                };
                while cursor.advance()? {
                    *position = cursor.position();
                    let Some(item) = cursor.values().next().transpose()? else {
                        continue;
                    };
                    if !sink(item) {
                        return Ok(false);
                    }
                }
                cursor.close();
                Ok(true)
            }
        }
    }
}

impl<T> std::fmt::Debug for SortBackend<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortBackend::InMemory { items } => write!(f, "InMemory({} items)", items.len()),
            SortBackend::Persisted { map, .. } => write!(f, "Persisted({})", map.name()),
        }
    }
}

/// External-sort run builder.
pub struct SortingProcessor<T> {
    name: String,
    order_fn: OrderFn<T>,
    backend: SortBackend<T>,
    pending: Option<T>,
    draining: bool,
    done: bool,
    emitted: u64,
}

impl<T: StateValue> SortingProcessor<T> {
    pub fn new(ctx: &ProcessorContext, backend: SortBackend<T>, order_fn: OrderFn<T>) -> Self {
        debug!(
            processor = %ctx.name,
            index = ctx.global_index,
            backend = ?backend,
            "[sw-02] Created sorting processor"
        );
        Self {
            name: ctx.name.clone(),
            order_fn,
            backend,
            pending: None,
            draining: false,
            done: false,
            emitted: 0,
        }
    }

    /// Sorting processor on the backend picked by `use_persistence`.
    pub fn with_persistence(
        ctx: &ProcessorContext,
        use_persistence: bool,
        order_fn: OrderFn<T>,
    ) -> ProcessorResult<Self> {
        let backend = SortBackend::select(&ctx.state, use_persistence)?;
        Ok(Self::new(ctx, backend, order_fn))
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

impl<T: StateValue> Processor for SortingProcessor<T> {
    type Input = T;
    type Output = T;

    fn try_process(&mut self, _ordinal: usize, item: &T) -> ProcessorResult<bool> {
        if self.draining {
            return Err(ProcessorError::InvalidOperation(format!(
                "{} received an item after completion started",
                self.name
            )));
        }
        let key = (self.order_fn)(item);
        self.backend.insert(key, item)
    }

    fn complete(&mut self, outbox: &mut dyn Outbox<T>) -> ProcessorResult<bool> {
        if let Some(item) = self.pending.take() {
            if let Err(item) = outbox.offer(item) {
                self.pending = Some(item);
                return Ok(false);
            }
            self.emitted += 1;
        }
        if self.done {
            return Ok(true);
        }
        self.draining = true;

        let pending = &mut self.pending;
        let emitted = &mut self.emitted;
        let exhausted = self.backend.drain(|item| match outbox.offer(item) {
            Ok(()) => {
                *emitted += 1;
                true
            }
            Err(item) => {
                *pending = Some(item);
                false
            }
        })?;

        if exhausted {
            self.done = true;
            // Drops the persisted run and its partition.
            self.backend = SortBackend::in_memory();
            info!(
                processor = %self.name,
                emitted = self.emitted,
                "[sw-02] Sorted run emitted"
            );
        }
        Ok(exhausted)
    }
}
