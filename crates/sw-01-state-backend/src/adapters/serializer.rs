use crate::domain::errors::StateError;
use crate::ports::outbound::StateSerializer;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Default serializer using bincode.
///
/// Fixed-size byte arrays are written verbatim, which keeps
/// [`OrderKey`](crate::OrderKey) bytes in numeric order.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeSerializer;

impl StateSerializer for BincodeSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, StateError> {
        bincode::serialize(value).map_err(|e| StateError::Serialization {
            message: e.to_string(),
        })
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StateError> {
        bincode::deserialize(bytes).map_err(|e| StateError::Serialization {
            message: e.to_string(),
        })
    }
}
