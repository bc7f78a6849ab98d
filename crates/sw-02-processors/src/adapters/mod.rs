//! # Adapters Module
//!
//! - `outbox`: bounded in-memory outbox
//! - `driver`: reference cooperative host loop

pub mod driver;
pub mod outbox;

pub use driver::{run_to_completion, CooperativeDriver, DriverStats};
pub use outbox::BoundedOutbox;
