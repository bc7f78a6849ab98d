//! # Domain Layer
//!
//! Pure types of the state backend: configuration, key layout, errors and
//! counters. Nothing here talks to the engine.
//!
//! ## Modules
//!
//! - `config` - Engine profiles and tuning
//! - `errors` - `StateError`
//! - `keys` - Prefix key encoding, order keys, cursor positions
//! - `metrics` - Partition and compaction counters

pub mod config;
pub mod errors;
pub mod keys;
pub mod metrics;
