//! # Service Layer
//!
//! - `store` - Runtime-selected keyed accumulator state
//! - `keyed` - Processing/completing/done state machine shared by keyed processors
//! - `grouping` - Single-stage keyed aggregation
//! - `two_stage` - Local accumulate and global combine
//! - `sorting` - Sorted-run builder
//! - `factories` - Processor suppliers

pub mod factories;
pub mod grouping;
pub mod keyed;
pub mod sorting;
pub mod store;
pub mod two_stage;

pub use factories::{accumulate_processor, combine_processor, grouping_processor, sorting_processor};
pub use grouping::GroupingProcessor;
pub use keyed::Phase;
pub use sorting::{SortBackend, SortingProcessor};
pub use store::{AccumulatorStore, FoldFn};
pub use two_stage::{AccumulateProcessor, CombineProcessor};
