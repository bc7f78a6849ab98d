//! # Grouping Processor
//!
//! Groups items of every input by key, folds each group through the
//! per-ordinal accumulate functions, finishes it and maps `(key, result)` to
//! an output record.
//!
//! With [`StateBackendKind::PersistedUnbounded`] the processor appends raw
//! `(ordinal, item)` entries to a prefix multimap while processing, compacts it
//! on the first `complete()` and folds one group at a time while draining, so
//! no group's state has to fit in memory before the drain.

use crate::domain::aggregate::AggregateOperation;
use crate::domain::errors::{ProcessorError, ProcessorResult};
use crate::domain::types::{KeyFn, OutputFn, StateBackendKind, StateKey, StateValue};
use crate::ports::processor::{Outbox, Processor, ProcessorContext};
use crate::service::keyed::{EmitFn, KeyedCore, Phase};
use crate::service::store::FoldFn;
use std::sync::Arc;

/// Keyed single-stage aggregation: accumulate and finish.
pub struct GroupingProcessor<T, K, A, O> {
    core: KeyedCore<T, K, A, O>,
}

impl<T, K, A, O> GroupingProcessor<T, K, A, O>
where
    T: StateValue,
    K: StateKey,
    A: StateValue,
    O: 'static,
{
    /// Grouping processor over any backend. One key function per ordinal.
    pub fn new<R: 'static>(
        ctx: &ProcessorContext,
        kind: StateBackendKind,
        key_fns: Vec<KeyFn<T, K>>,
        op: AggregateOperation<T, A, R>,
        map_output: OutputFn<K, R, O>,
    ) -> ProcessorResult<Self> {
        if key_fns.len() != op.arity() {
            return Err(ProcessorError::ArityMismatch {
                key_fns: key_fns.len(),
                arity: op.arity(),
            });
        }

        let create = op.create_fn();
        let finish = op.finish_fn();
        let fold: FoldFn<T, A> = Arc::new(move |ordinal: usize, acc: &mut A, item: &T| {
            op.accumulate(ordinal, acc, item)
        });
        let emit: EmitFn<K, A, O> = Arc::new(move |key: K, acc: A| {
            let result = finish(&acc);
            map_output(key, result)
        });

        Ok(Self {
            core: KeyedCore::new(ctx, kind, key_fns, create, fold, emit)?,
        })
    }

    /// Grouping processor backed by a prefix multimap.
    pub fn unbounded<R: 'static>(
        ctx: &ProcessorContext,
        key_fns: Vec<KeyFn<T, K>>,
        op: AggregateOperation<T, A, R>,
        map_output: OutputFn<K, R, O>,
    ) -> ProcessorResult<Self> {
        Self::new(
            ctx,
            StateBackendKind::PersistedUnbounded,
            key_fns,
            op,
            map_output,
        )
    }

    pub fn phase(&self) -> Phase {
        self.core.phase()
    }
}

impl<T, K, A, O> Processor for GroupingProcessor<T, K, A, O>
where
    T: StateValue,
    K: StateKey,
    A: StateValue,
    O: 'static,
{
    type Input = T;
    type Output = O;

    fn try_process(&mut self, ordinal: usize, item: &T) -> ProcessorResult<bool> {
        self.core.try_process(ordinal, item)
    }

    fn complete(&mut self, outbox: &mut dyn Outbox<O>) -> ProcessorResult<bool> {
        self.core.complete(outbox)
    }
}
