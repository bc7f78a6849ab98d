//! # Processor Factories
//!
//! Suppliers handed to the external topology builder. Each supplier builds one
//! processor instance per [`ProcessorContext`], taking partitions from the
//! context's state handle.

use crate::domain::aggregate::AggregateOperation;
use crate::domain::errors::{ProcessorError, ProcessorResult};
use crate::domain::types::{KeyFn, OrderFn, OutputFn, StateBackendKind, StateKey, StateValue};
use crate::ports::processor::{BoxedProcessor, ProcessorContext, ProcessorSupplier};
use crate::service::grouping::GroupingProcessor;
use crate::service::sorting::SortingProcessor;
use crate::service::two_stage::{AccumulateProcessor, CombineProcessor};
use std::sync::Arc;

/// Single-stage keyed aggregation (also the fallback for operations without
/// a combine function).
pub fn grouping_processor<T, K, A, R, O>(
    kind: StateBackendKind,
    key_fns: Vec<KeyFn<T, K>>,
    op: AggregateOperation<T, A, R>,
    map_output: impl Fn(K, R) -> O + Send + Sync + 'static,
) -> impl ProcessorSupplier<T, O>
where
    T: StateValue,
    K: StateKey,
    A: StateValue,
    R: 'static,
    O: 'static,
{
    let map_output: OutputFn<K, R, O> = Arc::new(map_output);
    move |ctx: &ProcessorContext| -> ProcessorResult<BoxedProcessor<T, O>> {
        let processor = GroupingProcessor::new(
            ctx,
            kind,
            key_fns.clone(),
            op.clone(),
            Arc::clone(&map_output),
        )?;
        Ok(Box::new(processor))
    }
}

/// Local stage of a two-stage aggregation.
pub fn accumulate_processor<T, K, A, R>(
    kind: StateBackendKind,
    key_fns: Vec<KeyFn<T, K>>,
    op: AggregateOperation<T, A, R>,
) -> impl ProcessorSupplier<T, (K, A)>
where
    T: StateValue,
    K: StateKey,
    A: StateValue,
    R: 'static,
{
    move |ctx: &ProcessorContext| -> ProcessorResult<BoxedProcessor<T, (K, A)>> {
        let processor = AccumulateProcessor::new(ctx, kind, key_fns.clone(), op.clone())?;
        Ok(Box::new(processor))
    }
}

/// Global stage of a two-stage aggregation.
///
/// Fails up front with `MissingCombine` rather than per instance.
pub fn combine_processor<T, K, A, R, O>(
    kind: StateBackendKind,
    op: AggregateOperation<T, A, R>,
    map_output: impl Fn(K, R) -> O + Send + Sync + 'static,
) -> ProcessorResult<impl ProcessorSupplier<(K, A), O>>
where
    T: 'static,
    K: StateKey,
    A: StateValue,
    R: 'static,
    O: 'static,
{
    if !op.has_combine() {
        return Err(ProcessorError::MissingCombine);
    }
    let map_output: OutputFn<K, R, O> = Arc::new(map_output);
    Ok(
        move |ctx: &ProcessorContext| -> ProcessorResult<BoxedProcessor<(K, A), O>> {
            let processor = CombineProcessor::new(ctx, kind, &op, Arc::clone(&map_output))?;
            Ok(Box::new(processor))
        },
    )
}

/// Sorted-run stage of an external sort.
pub fn sorting_processor<T>(
    use_persistence: bool,
    order_fn: impl Fn(&T) -> i64 + Send + Sync + 'static,
) -> impl ProcessorSupplier<T, T>
where
    T: StateValue,
{
    let order_fn: OrderFn<T> = Arc::new(order_fn);
    move |ctx: &ProcessorContext| -> ProcessorResult<BoxedProcessor<T, T>> {
        let processor = SortingProcessor::with_persistence(ctx, use_persistence, Arc::clone(&order_fn))?;
        Ok(Box::new(processor))
    }
}
