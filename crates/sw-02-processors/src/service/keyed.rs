//! Shared state machine of the keyed processors.
//!
//! ```text
//! PROCESSING ──first complete()──→ COMPLETING ──store drained──→ DONE
//! ```
//!
//! Output the outbox refused is parked in `pending` and offered first on the
//! next `complete()`, so nothing is re-emitted or lost across calls.

use crate::domain::aggregate::CreateFn;
use crate::domain::errors::{ProcessorError, ProcessorResult};
use crate::domain::types::{KeyFn, StateBackendKind, StateKey, StateValue};
use crate::ports::processor::{Outbox, ProcessorContext};
use crate::service::store::{AccumulatorStore, FoldFn};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns a drained `(key, accumulator)` pair into an output record.
pub(crate) type EmitFn<K, A, O> = Arc<dyn Fn(K, A) -> O + Send + Sync>;

/// Lifecycle phase of a keyed processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Processing,
    Completing,
    Done,
}

pub(crate) struct KeyedCore<T, K, A, O> {
    name: String,
    key_fns: Vec<KeyFn<T, K>>,
    store: AccumulatorStore<K, T, A>,
    emit: EmitFn<K, A, O>,
    phase: Phase,
    pending: Option<O>,
    received: u64,
    emitted: u64,
}

impl<T, K, A, O> KeyedCore<T, K, A, O>
where
    T: StateValue,
    K: StateKey,
    A: StateValue,
{
    pub(crate) fn new(
        ctx: &ProcessorContext,
        kind: StateBackendKind,
        key_fns: Vec<KeyFn<T, K>>,
        create: CreateFn<A>,
        fold: FoldFn<T, A>,
        emit: EmitFn<K, A, O>,
    ) -> ProcessorResult<Self> {
        let store = AccumulatorStore::new(kind, &ctx.state, create, fold)?;
        debug!(
            processor = %ctx.name,
            index = ctx.global_index,
            backend = ?kind,
            "[sw-02] Created keyed processor"
        );

        Ok(Self {
            name: ctx.name.clone(),
            key_fns,
            store,
            emit,
            phase: Phase::Processing,
            pending: None,
            received: 0,
            emitted: 0,
        })
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn try_process(&mut self, ordinal: usize, item: &T) -> ProcessorResult<bool> {
        if self.phase != Phase::Processing {
            return Err(ProcessorError::InvalidOperation(format!(
                "{} received an item after completion started",
                self.name
            )));
        }
        let key_fn = self
            .key_fns
            .get(ordinal)
            .ok_or(ProcessorError::UnknownOrdinal {
                ordinal,
                arity: self.key_fns.len(),
            })?;

        let accepted = self.store.insert(ordinal, key_fn(item), item)?;
        if accepted {
            self.received += 1;
        }
        Ok(accepted)
    }

    pub(crate) fn complete(&mut self, outbox: &mut dyn Outbox<O>) -> ProcessorResult<bool> {
        if let Some(item) = self.pending.take() {
            if let Err(item) = outbox.offer(item) {
                self.pending = Some(item);
                return Ok(false);
            }
            self.emitted += 1;
        }

        match self.phase {
            Phase::Done => return Ok(true),
            Phase::Processing => {
                debug!(
                    processor = %self.name,
                    received = self.received,
                    backend = ?self.store.kind(),
                    "[sw-02] Draining keyed state"
                );
                self.phase = Phase::Completing;
            }
            Phase::Completing => {}
        }

        let emit = &self.emit;
        let pending = &mut self.pending;
        let emitted = &mut self.emitted;
        let exhausted = self.store.drain(|key, acc| match outbox.offer(emit(key, acc)) {
            Ok(()) => {
                *emitted += 1;
                true
            }
            Err(item) => {
                *pending = Some(item);
                false
            }
        })?;

        if !exhausted {
            return Ok(false);
        }

        self.phase = Phase::Done;
        self.store.release();
        info!(
            processor = %self.name,
            received = self.received,
            emitted = self.emitted,
            "[sw-02] Keyed processor done"
        );
        Ok(true)
    }
}
