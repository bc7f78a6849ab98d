//! # Processors (sw-02)
//!
//! Keyed grouping, external sorting and two-stage aggregation over the
//! job-scoped state backend. Every processor follows the cooperative
//! `try_process` / `complete` contract in [`ports::processor`].
//!
//! ## Processors
//!
//! | Processor | Input | Output | State |
//! |-----------|-------|--------|-------|
//! | `GroupingProcessor` | `T` per ordinal | `map(K, finish(A))` | any [`StateBackendKind`] |
//! | `AccumulateProcessor` | `T` per ordinal | `(K, A)` | any [`StateBackendKind`] |
//! | `CombineProcessor` | `(K, A)` | `map(K, finish(A))` | any [`StateBackendKind`] |
//! | `SortingProcessor` | `T` | `T` ascending by order key | memory or sorted prefix map |
//!
//! ## Backpressure
//!
//! `try_process` returns `Ok(false)` when the engine refused an append under
//! write pressure. The host offers the same item again on a later pass.
//! Storage errors are fatal and surface as [`ProcessorError::State`].
//!
//! ## Usage
//!
//! ```ignore
//! use sw_02_processors::*;
//!
//! let op = counting::<String>();
//! match plan_aggregation(&op, 1, true) {
//!     AggregationPlan::TwoStage { backend, local, global } => {
//!         let key_fns: Vec<KeyFn<String, String>> = vec![Arc::new(|s: &String| s.clone())];
//!         let local_supplier = accumulate_processor(backend, key_fns, op.clone());
//!         let global_supplier = combine_processor(backend, op, |k, n| (k, n))?;
//!         // hand suppliers and stage specs to the topology builder
//!     }
//!     AggregationPlan::SingleStage { .. } => unreachable!(),
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{run_to_completion, BoundedOutbox, CooperativeDriver, DriverStats};
pub use domain::aggregate::{
    counting, summing, to_list, AggregateOperation, AggregateOperationBuilder,
};
pub use domain::errors::{ProcessorError, ProcessorResult};
pub use domain::plan::{
    aggregate_stage_name, plan_aggregation, plan_sort, AggregationPlan, EdgeRouting, SortPlan,
    StageSpec, PREPARE_SUFFIX,
};
pub use domain::types::{KeyFn, OrderFn, OutputFn, StateBackendKind, StateKey, StateValue};
pub use ports::{BoxedProcessor, Outbox, Processor, ProcessorContext, ProcessorSupplier};
pub use service::{
    accumulate_processor, combine_processor, grouping_processor, sorting_processor,
    AccumulateProcessor, AccumulatorStore, CombineProcessor, GroupingProcessor, Phase,
    SortBackend, SortingProcessor,
};
