//! # Domain Layer
//!
//! - `aggregate` - Aggregate operation descriptor and ready-made operations
//! - `errors` - `ProcessorError`
//! - `plan` - Stage plans for the external topology builder
//! - `types` - Key/value bounds, function aliases, backend selection

pub mod aggregate;
pub mod errors;
pub mod plan;
pub mod types;
