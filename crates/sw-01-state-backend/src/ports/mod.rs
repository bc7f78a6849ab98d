//! # Ports Layer
//!
//! - `outbound` - Serialization service required from the host

pub mod outbound;

pub use outbound::StateSerializer;
