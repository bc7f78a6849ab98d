//! # Two-Stage Aggregation
//!
//! ```text
//! upstream partition 0 ──→ AccumulateProcessor ─┐ (key, partial)
//! upstream partition 1 ──→ AccumulateProcessor ─┼──all-to-one──→ CombineProcessor ──→ (key, result)
//! upstream partition N ──→ AccumulateProcessor ─┘
//! ```
//!
//! The local stage folds items per key and emits raw accumulators. The global
//! stage merges same-key partials with the combine function and finishes them.
//! Operations without a combine function run single-stage through
//! [`GroupingProcessor`](crate::GroupingProcessor) instead.

use crate::domain::aggregate::AggregateOperation;
use crate::domain::errors::{ProcessorError, ProcessorResult};
use crate::domain::types::{KeyFn, OutputFn, StateBackendKind, StateKey, StateValue};
use crate::ports::processor::{Outbox, Processor, ProcessorContext};
use crate::service::keyed::{EmitFn, KeyedCore, Phase};
use crate::service::store::FoldFn;
use std::sync::Arc;

/// Local stage: emits `(key, partial accumulator)`.
pub struct AccumulateProcessor<T, K, A> {
    core: KeyedCore<T, K, A, (K, A)>,
}

impl<T, K, A> AccumulateProcessor<T, K, A>
where
    T: StateValue,
    K: StateKey,
    A: StateValue,
{
    pub fn new<R: 'static>(
        ctx: &ProcessorContext,
        kind: StateBackendKind,
        key_fns: Vec<KeyFn<T, K>>,
        op: AggregateOperation<T, A, R>,
    ) -> ProcessorResult<Self> {
        if key_fns.len() != op.arity() {
            return Err(ProcessorError::ArityMismatch {
                key_fns: key_fns.len(),
                arity: op.arity(),
            });
        }

        let create = op.create_fn();
        let fold: FoldFn<T, A> = Arc::new(move |ordinal: usize, acc: &mut A, item: &T| {
            op.accumulate(ordinal, acc, item)
        });
        let emit: EmitFn<K, A, (K, A)> = Arc::new(|key: K, acc: A| (key, acc));

        Ok(Self {
            core: KeyedCore::new(ctx, kind, key_fns, create, fold, emit)?,
        })
    }

    pub fn phase(&self) -> Phase {
        self.core.phase()
    }
}

impl<T, K, A> Processor for AccumulateProcessor<T, K, A>
where
    T: StateValue,
    K: StateKey,
    A: StateValue,
{
    type Input = T;
    type Output = (K, A);

    fn try_process(&mut self, ordinal: usize, item: &T) -> ProcessorResult<bool> {
        self.core.try_process(ordinal, item)
    }

    fn complete(&mut self, outbox: &mut dyn Outbox<(K, A)>) -> ProcessorResult<bool> {
        self.core.complete(outbox)
    }
}

/// Global stage: merges partials per key, finishes and maps the result.
pub struct CombineProcessor<K, A, O> {
    core: KeyedCore<(K, A), K, A, O>,
}

impl<K, A, O> CombineProcessor<K, A, O>
where
    K: StateKey,
    A: StateValue,
    O: 'static,
{
    /// Fails with `MissingCombine` if `op` cannot merge partials.
    pub fn new<T: 'static, R: 'static>(
        ctx: &ProcessorContext,
        kind: StateBackendKind,
        op: &AggregateOperation<T, A, R>,
        map_output: OutputFn<K, R, O>,
    ) -> ProcessorResult<Self> {
        let combine = op.combine_fn().ok_or(ProcessorError::MissingCombine)?;
        let finish = op.finish_fn();

        let key_fn: KeyFn<(K, A), K> = Arc::new(|entry: &(K, A)| entry.0.clone());
        let fold: FoldFn<(K, A), A> =
            Arc::new(move |_: usize, acc: &mut A, entry: &(K, A)| -> ProcessorResult<()> {
                combine(acc, &entry.1);
                Ok(())
            });
        let emit: EmitFn<K, A, O> = Arc::new(move |key: K, acc: A| {
            let result = finish(&acc);
            map_output(key, result)
        });

        Ok(Self {
            core: KeyedCore::new(ctx, kind, vec![key_fn], op.create_fn(), fold, emit)?,
        })
    }

    pub fn phase(&self) -> Phase {
        self.core.phase()
    }
}

impl<K, A, O> Processor for CombineProcessor<K, A, O>
where
    K: StateKey,
    A: StateValue,
    O: 'static,
{
    type Input = (K, A);
    type Output = O;

    fn try_process(&mut self, ordinal: usize, item: &(K, A)) -> ProcessorResult<bool> {
        self.core.try_process(ordinal, item)
    }

    fn complete(&mut self, outbox: &mut dyn Outbox<O>) -> ProcessorResult<bool> {
        self.core.complete(outbox)
    }
}
