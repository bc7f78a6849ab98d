//! # Processor Execution Contract
//!
//! The host engine drives each processor instance from one thread:
//!
//! 1. `try_process` for every inbound item. `Ok(false)` means "not taken,
//!    offer the same item again later".
//! 2. `complete` repeatedly once input is exhausted, until it returns
//!    `Ok(true)`. Each call emits what the outbox accepts and returns promptly.

use crate::domain::errors::ProcessorResult;
use std::sync::Arc;
use sw_01_state_backend::StateBackendHandle;

/// Downstream buffer a processor emits into.
pub trait Outbox<T> {
    /// Hand `item` downstream, or get it back if the outbox is full.
    fn offer(&mut self, item: T) -> Result<(), T>;
}

/// A cooperative processor.
pub trait Processor {
    type Input;
    type Output;

    /// Take one item from input `ordinal`. `Ok(false)` is backpressure.
    fn try_process(&mut self, ordinal: usize, item: &Self::Input) -> ProcessorResult<bool>;

    /// Emit buffered results. Returns true once everything was emitted.
    fn complete(&mut self, outbox: &mut dyn Outbox<Self::Output>) -> ProcessorResult<bool>;
}

pub type BoxedProcessor<I, O> = Box<dyn Processor<Input = I, Output = O>>;

/// What a processor instance gets from its execution context.
#[derive(Debug, Clone)]
pub struct ProcessorContext {
    /// The job's state backend, already opened.
    pub state: Arc<StateBackendHandle>,
    pub name: String,
    pub global_index: usize,
}

impl ProcessorContext {
    pub fn new(state: Arc<StateBackendHandle>, name: impl Into<String>, global_index: usize) -> Self {
        Self {
            state,
            name: name.into(),
            global_index,
        }
    }
}

/// Builds one processor instance per context.
pub trait ProcessorSupplier<I, O> {
    fn get(&self, ctx: &ProcessorContext) -> ProcessorResult<BoxedProcessor<I, O>>;
}

impl<I, O, F> ProcessorSupplier<I, O> for F
where
    F: Fn(&ProcessorContext) -> ProcessorResult<BoxedProcessor<I, O>>,
{
    fn get(&self, ctx: &ProcessorContext) -> ProcessorResult<BoxedProcessor<I, O>> {
        self(ctx)
    }
}
