//! # Adapters Module
//!
//! - `rocksdb_options`: engine tuning for the two workload profiles
//! - `serializer`: bincode implementation of the serializer port

pub mod rocksdb_options;
pub mod serializer;

pub use rocksdb_options::EngineOptions;
pub use serializer::BincodeSerializer;
