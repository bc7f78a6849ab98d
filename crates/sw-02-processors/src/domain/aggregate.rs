//! # Aggregate Operations
//!
//! An [`AggregateOperation`] describes how to fold items into an accumulator:
//!
//! - `create`: fresh accumulator for a new key
//! - `accumulate[ordinal]`: fold one item from input `ordinal`
//! - `combine` (optional): merge a partial accumulator into another; its
//!   presence makes the operation eligible for two-stage execution
//! - `finish`: turn an accumulator into the visible result
//!
//! Items of every input share the type `T`; hosts with heterogeneous inputs
//! wrap them in an enum.

use crate::domain::errors::{ProcessorError, ProcessorResult};
use std::sync::Arc;

pub type CreateFn<A> = Arc<dyn Fn() -> A + Send + Sync>;
pub type AccumulateFn<A, T> = Arc<dyn Fn(&mut A, &T) + Send + Sync>;
pub type CombineFn<A> = Arc<dyn Fn(&mut A, &A) + Send + Sync>;
pub type FinishFn<A, R> = Arc<dyn Fn(&A) -> R + Send + Sync>;

/// Aggregate operation descriptor.
pub struct AggregateOperation<T, A, R> {
    create: CreateFn<A>,
    accumulate: Vec<AccumulateFn<A, T>>,
    combine: Option<CombineFn<A>>,
    finish: FinishFn<A, R>,
    unbounded: bool,
}

impl<T, A> AggregateOperation<T, A, ()> {
    /// Start a descriptor from its accumulator factory. The result type is
    /// fixed by `and_finish`.
    pub fn builder(create: impl Fn() -> A + Send + Sync + 'static) -> AggregateOperationBuilder<T, A> {
        AggregateOperationBuilder {
            create: Arc::new(create),
            accumulate: Vec::new(),
            combine: None,
            unbounded: false,
        }
    }
}

impl<T, A, R> AggregateOperation<T, A, R> {
    /// Number of inputs (one accumulate function each).
    pub fn arity(&self) -> usize {
        self.accumulate.len()
    }

    pub fn has_combine(&self) -> bool {
        self.combine.is_some()
    }

    /// True if the accumulator grows with the input (lists, sets).
    pub fn is_unbounded(&self) -> bool {
        self.unbounded
    }

    pub fn create_accumulator(&self) -> A {
        (self.create)()
    }

    pub fn accumulate(&self, ordinal: usize, acc: &mut A, item: &T) -> ProcessorResult<()> {
        let f = self
            .accumulate
            .get(ordinal)
            .ok_or(ProcessorError::UnknownOrdinal {
                ordinal,
                arity: self.accumulate.len(),
            })?;
        f(acc, item);
        Ok(())
    }

    pub fn combine(&self, acc: &mut A, partial: &A) -> ProcessorResult<()> {
        let f = self.combine.as_ref().ok_or(ProcessorError::MissingCombine)?;
        f(acc, partial);
        Ok(())
    }

    pub fn finish(&self, acc: &A) -> R {
        (self.finish)(acc)
    }

    pub(crate) fn create_fn(&self) -> CreateFn<A> {
        Arc::clone(&self.create)
    }

    pub(crate) fn combine_fn(&self) -> Option<CombineFn<A>> {
        self.combine.clone()
    }

    pub(crate) fn finish_fn(&self) -> FinishFn<A, R> {
        Arc::clone(&self.finish)
    }
}

impl<T, A, R> Clone for AggregateOperation<T, A, R> {
    fn clone(&self) -> Self {
        Self {
            create: Arc::clone(&self.create),
            accumulate: self.accumulate.clone(),
            combine: self.combine.clone(),
            finish: Arc::clone(&self.finish),
            unbounded: self.unbounded,
        }
    }
}

impl<T, A, R> std::fmt::Debug for AggregateOperation<T, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateOperation")
            .field("arity", &self.arity())
            .field("has_combine", &self.has_combine())
            .field("unbounded", &self.unbounded)
            .finish()
    }
}

/// Builder for [`AggregateOperation`].
pub struct AggregateOperationBuilder<T, A> {
    create: CreateFn<A>,
    accumulate: Vec<AccumulateFn<A, T>>,
    combine: Option<CombineFn<A>>,
    unbounded: bool,
}

impl<T, A> AggregateOperationBuilder<T, A> {
    /// Add the accumulate function for the next ordinal.
    pub fn and_accumulate(mut self, f: impl Fn(&mut A, &T) + Send + Sync + 'static) -> Self {
        self.accumulate.push(Arc::new(f));
        self
    }

    pub fn and_combine(mut self, f: impl Fn(&mut A, &A) + Send + Sync + 'static) -> Self {
        self.combine = Some(Arc::new(f));
        self
    }

    /// Mark the accumulator as growing with its input.
    pub fn unbounded(mut self) -> Self {
        self.unbounded = true;
        self
    }

    pub fn and_finish<R>(
        self,
        f: impl Fn(&A) -> R + Send + Sync + 'static,
    ) -> ProcessorResult<AggregateOperation<T, A, R>> {
        if self.accumulate.is_empty() {
            return Err(ProcessorError::InvalidOperation(
                "at least one accumulate function is required".to_string(),
            ));
        }
        Ok(AggregateOperation {
            create: self.create,
            accumulate: self.accumulate,
            combine: self.combine,
            finish: Arc::new(f),
            unbounded: self.unbounded,
        })
    }
}

/// Counts items per key.
pub fn counting<T: 'static>() -> AggregateOperation<T, u64, u64> {
    let accumulate: AccumulateFn<u64, T> = Arc::new(|acc: &mut u64, _: &T| *acc += 1);
    AggregateOperation {
        create: Arc::new(|| 0),
        accumulate: vec![accumulate],
        combine: Some(Arc::new(|acc: &mut u64, partial: &u64| *acc += partial)),
        finish: Arc::new(|acc: &u64| *acc),
        unbounded: false,
    }
}

/// Sums `f(item)` per key.
pub fn summing<T: 'static>(
    f: impl Fn(&T) -> i64 + Send + Sync + 'static,
) -> AggregateOperation<T, i64, i64> {
    let accumulate: AccumulateFn<i64, T> = Arc::new(move |acc: &mut i64, item: &T| *acc += f(item));
    AggregateOperation {
        create: Arc::new(|| 0),
        accumulate: vec![accumulate],
        combine: Some(Arc::new(|acc: &mut i64, partial: &i64| *acc += partial)),
        finish: Arc::new(|acc: &i64| *acc),
        unbounded: false,
    }
}

/// Collects items per key, in arrival order.
pub fn to_list<T: Clone + 'static>() -> AggregateOperation<T, Vec<T>, Vec<T>> {
    let accumulate: AccumulateFn<Vec<T>, T> =
        Arc::new(|acc: &mut Vec<T>, item: &T| acc.push(item.clone()));
    AggregateOperation {
        create: Arc::new(Vec::new),
        accumulate: vec![accumulate],
        combine: Some(Arc::new(|acc: &mut Vec<T>, partial: &Vec<T>| {
            acc.extend(partial.iter().cloned())
        })),
        finish: Arc::new(|acc: &Vec<T>| acc.clone()),
        unbounded: true,
    }
}
