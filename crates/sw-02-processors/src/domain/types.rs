use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::sync::Arc;

/// Grouping keys: hashable in memory, serializable when spilled.
pub trait StateKey: Eq + Hash + Clone + Serialize + DeserializeOwned + 'static {}

impl<T> StateKey for T where T: Eq + Hash + Clone + Serialize + DeserializeOwned + 'static {}

/// Items and accumulators that may be spilled to a partition.
pub trait StateValue: Clone + Serialize + DeserializeOwned + 'static {}

impl<T> StateValue for T where T: Clone + Serialize + DeserializeOwned + 'static {}

/// Extracts the grouping key of an item.
pub type KeyFn<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

/// Extracts the 64-bit order key of an item.
pub type OrderFn<T> = Arc<dyn Fn(&T) -> i64 + Send + Sync>;

/// Maps a finished `(key, result)` pair to an output record.
pub type OutputFn<K, R, O> = Arc<dyn Fn(K, R) -> O + Send + Sync>;

/// Where keyed processor state lives.
///
/// Chosen once per operation instance, never per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateBackendKind {
    /// One accumulator per key in a `HashMap`.
    InMemory,
    /// One accumulator per key in a point map, updated read-modify-write.
    Persisted,
    /// Raw items appended to a prefix multimap, folded per key on drain.
    PersistedUnbounded,
}

impl StateBackendKind {
    /// Pick a backend from the persistence flag and the operation's state shape.
    pub fn select(use_persistence: bool, unbounded_state: bool) -> Self {
        match (use_persistence, unbounded_state) {
            (false, _) => StateBackendKind::InMemory,
            (true, false) => StateBackendKind::Persisted,
            (true, true) => StateBackendKind::PersistedUnbounded,
        }
    }

    pub fn is_persisted(&self) -> bool {
        !matches!(self, StateBackendKind::InMemory)
    }
}
