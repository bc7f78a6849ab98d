//! # Prefix Key Encoding
//!
//! Layout of keys stored in prefix partitions:
//!
//! ```text
//! MultiValue:  [u32 BE key length][serialized key][u64 BE sequence]
//! SingleValue: [u32 BE key length][serialized key]
//!              \________ group prefix ________/
//! ```
//!
//! The group prefix is prefix-free: no group prefix is a proper prefix of
//! another. Every entry of one logical key therefore sorts contiguously, and
//! within a group entries sort by insertion sequence.

use serde::{Deserialize, Serialize};

/// Width of the big-endian key length header.
pub const LENGTH_HEADER: usize = 4;

/// Width of the big-endian insertion sequence suffix.
pub const SEQUENCE_SUFFIX: usize = 8;

/// How a prefix partition treats repeated keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixMode {
    /// Every `add` is kept; values come back in insertion order.
    MultiValue,
    /// One value per key, last write wins.
    SingleValue,
}

/// Build the group prefix for serialized key bytes.
pub fn group_prefix(key_bytes: &[u8]) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(LENGTH_HEADER + key_bytes.len() + SEQUENCE_SUFFIX);
    prefix.extend_from_slice(&(key_bytes.len() as u32).to_be_bytes());
    prefix.extend_from_slice(key_bytes);
    prefix
}

/// Build the stored key for one insertion.
pub fn entry_key(key_bytes: &[u8], mode: PrefixMode, sequence: u64) -> Vec<u8> {
    let mut key = group_prefix(key_bytes);
    if mode == PrefixMode::MultiValue {
        key.extend_from_slice(&sequence.to_be_bytes());
    }
    key
}

/// Length of the group prefix at the start of `raw`, if `raw` is well formed.
pub fn group_prefix_len(raw: &[u8]) -> Option<usize> {
    let header: [u8; LENGTH_HEADER] = raw.get(..LENGTH_HEADER)?.try_into().ok()?;
    let len = LENGTH_HEADER + u32::from_be_bytes(header) as usize;
    (raw.len() >= len).then_some(len)
}

/// Split a stored key into (group prefix, serialized key bytes).
pub fn split_group(raw: &[u8]) -> Option<(&[u8], &[u8])> {
    let len = group_prefix_len(raw)?;
    Some((&raw[..len], &raw[LENGTH_HEADER..len]))
}

/// Insertion sequence of a multi-value entry.
#[cfg(test)]
fn entry_sequence(raw: &[u8]) -> Option<u64> {
    let len = group_prefix_len(raw)?;
    let suffix: [u8; SEQUENCE_SUFFIX] = raw.get(len..len + SEQUENCE_SUFFIX)?.try_into().ok()?;
    Some(u64::from_be_bytes(suffix))
}

/// Prefix extractor installed on prefix partitions.
///
/// Must be a plain `fn`: the engine calls it from its own threads.
pub fn prefix_extractor(raw: &[u8]) -> &[u8] {
    match group_prefix_len(raw) {
        Some(len) => &raw[..len],
        None => raw,
    }
}

/// Keys the extractor can handle.
pub fn prefix_in_domain(raw: &[u8]) -> bool {
    group_prefix_len(raw).is_some()
}

/// Opaque resume point of a scan: the raw key (or group prefix) last consumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CursorPosition(pub(crate) Vec<u8>);

impl CursorPosition {
    /// Raw bytes of the position.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// 64-bit order key whose serialized bytes sort like the signed value.
///
/// Stored as the sign-flipped big-endian representation, so `i64::MIN` maps
/// to all zero bytes and `i64::MAX` to all ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey([u8; 8]);

impl OrderKey {
    const SIGN: u64 = 1 << 63;

    pub fn new(value: i64) -> Self {
        OrderKey(((value as u64) ^ Self::SIGN).to_be_bytes())
    }

    pub fn value(&self) -> i64 {
        (u64::from_be_bytes(self.0) ^ Self::SIGN) as i64
    }
}

impl From<i64> for OrderKey {
    fn from(value: i64) -> Self {
        OrderKey::new(value)
    }
}
