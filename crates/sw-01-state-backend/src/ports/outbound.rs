//! # Outbound Ports (Driven Ports)
//!
//! Collaborators the state backend requires from its host.
//!
//! Keys and values reach the engine as opaque bytes produced by the host's
//! serialization service. The backend only needs one guarantee beyond
//! round-tripping: equal values serialize to equal bytes, so that equal keys
//! land in the same group.

use crate::domain::errors::StateError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Abstract interface for the job-level serialization service.
///
/// Production and tests: `BincodeSerializer` (adapters/serializer.rs)
pub trait StateSerializer: Send + Sync {
    /// Serialize a value to bytes.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, StateError>;

    /// Deserialize bytes back into a value.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StateError>;
}
