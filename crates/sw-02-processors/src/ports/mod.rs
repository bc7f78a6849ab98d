//! # Ports Layer
//!
//! - `processor` - Execution contract between the host engine and processors

pub mod processor;

pub use processor::{BoxedProcessor, Outbox, Processor, ProcessorContext, ProcessorSupplier};
