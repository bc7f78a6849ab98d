//! # State Backend Configuration
//!
//! Engine tuning for the two workloads the backend serves:
//!
//! - **Bulk load**: append-heavy prefix maps that are compacted once and then
//!   scanned group by group.
//! - **Point lookup**: read-modify-write point maps holding one value per key.
//!
//! All values have defaults matching the tuned engine profiles. Individual
//! values can be overridden through `with_*` builders or environment variables
//! (see [`StateBackendConfig::from_env`]).

use crate::domain::errors::{StateError, StateResult};
use serde::{Deserialize, Serialize};
use std::env;

const MIB: usize = 1024 * 1024;

/// Which engine-wide profile the handle opens the database with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineProfile {
    /// Bulk-load tuned database (no auto compaction, parallel sub-compactions).
    BulkLoad,
    /// Point-lookup tuned database.
    PointLookup,
}

impl EngineProfile {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "bulk-load" | "bulk_load" | "bulkload" => Some(EngineProfile::BulkLoad),
            "point-lookup" | "point_lookup" | "pointlookup" => Some(EngineProfile::PointLookup),
            _ => None,
        }
    }
}

/// Options for prefix (bulk-load) partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkLoadOptions {
    /// Memtable size in bytes (default: 128MB)
    pub memtable_size: usize,
    /// Memtables per partition (default: 4)
    pub memtable_number: i32,
    /// Bloom filter bits per key (default: 10)
    pub bloom_filter_bits: u32,
    /// LSM levels per partition (default: 2)
    pub num_levels: i32,
    /// Threads used to split a manual compaction (default: 4)
    pub sub_compactions: u32,
}

impl Default for BulkLoadOptions {
    fn default() -> Self {
        Self {
            memtable_size: 128 * MIB,
            memtable_number: 4,
            bloom_filter_bits: 10,
            num_levels: 2,
            sub_compactions: 4,
        }
    }
}

/// Options for point partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointLookupOptions {
    /// Memtable size in bytes (default: 64MB)
    pub memtable_size: usize,
    /// Memtables per partition (default: 2)
    pub memtable_number: i32,
    /// Bloom filter bits per key (default: 10)
    pub bloom_filter_bits: u32,
    /// LRU block cache size in bytes, shared by all point partitions (default: 128MB)
    pub block_cache_size: usize,
    /// Write-ahead log for point writes (default: false, state is ephemeral)
    pub wal_enabled: bool,
}

impl Default for PointLookupOptions {
    fn default() -> Self {
        Self {
            memtable_size: 64 * MIB,
            memtable_number: 2,
            bloom_filter_bits: 10,
            block_cache_size: 128 * MIB,
            wal_enabled: false,
        }
    }
}

/// Configuration for a job-scoped state backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBackendConfig {
    /// Engine-wide profile used when the database is opened.
    pub profile: EngineProfile,
    /// Options applied to every prefix partition.
    pub bulk_load: BulkLoadOptions,
    /// Options applied to every point partition.
    pub point_lookup: PointLookupOptions,
    /// Prefix of the job directory created under the base directory.
    pub directory_prefix: String,
}

impl Default for StateBackendConfig {
    fn default() -> Self {
        Self {
            profile: EngineProfile::BulkLoad,
            bulk_load: BulkLoadOptions::default(),
            point_lookup: PointLookupOptions::default(),
            directory_prefix: "spillway-state".to_string(),
        }
    }
}

impl StateBackendConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config for testing (small buffers, small cache)
    pub fn for_testing() -> Self {
        Self {
            profile: EngineProfile::BulkLoad,
            bulk_load: BulkLoadOptions {
                memtable_size: 4 * MIB,
                memtable_number: 2,
                bloom_filter_bits: 10,
                num_levels: 2,
                sub_compactions: 1,
            },
            point_lookup: PointLookupOptions {
                memtable_size: 4 * MIB,
                memtable_number: 2,
                bloom_filter_bits: 10,
                block_cache_size: 8 * MIB,
                wal_enabled: false,
            },
            directory_prefix: "spillway-test".to_string(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SW_STATE_PROFILE`: `bulk-load` or `point-lookup` (default: bulk-load)
    /// - `SW_MEMTABLE_SIZE`: memtable size in bytes, both profiles
    /// - `SW_MEMTABLE_NUMBER`: memtables per partition, both profiles
    /// - `SW_BLOOM_FILTER_BITS`: bloom filter bits per key, both profiles
    /// - `SW_SUB_COMPACTIONS`: compaction parallelism for prefix partitions
    /// - `SW_BLOCK_CACHE_SIZE`: block cache size in bytes for point partitions
    /// - `SW_WAL_ENABLED`: enable the WAL for point partitions (default: false)
    /// - `SW_STATE_DIR_PREFIX`: job directory prefix (default: spillway-state)
    ///
    /// Values that fail to parse are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(profile) = env::var("SW_STATE_PROFILE")
            .ok()
            .and_then(|v| EngineProfile::parse(&v))
        {
            config.profile = profile;
        }
        if let Some(size) = parse_env::<usize>("SW_MEMTABLE_SIZE") {
            config.bulk_load.memtable_size = size;
            config.point_lookup.memtable_size = size;
        }
        if let Some(number) = parse_env::<i32>("SW_MEMTABLE_NUMBER") {
            config.bulk_load.memtable_number = number;
            config.point_lookup.memtable_number = number;
        }
        if let Some(bits) = parse_env::<u32>("SW_BLOOM_FILTER_BITS") {
            config.bulk_load.bloom_filter_bits = bits;
            config.point_lookup.bloom_filter_bits = bits;
        }
        if let Some(threads) = parse_env::<u32>("SW_SUB_COMPACTIONS") {
            config.bulk_load.sub_compactions = threads;
        }
        if let Some(size) = parse_env::<usize>("SW_BLOCK_CACHE_SIZE") {
            config.point_lookup.block_cache_size = size;
        }
        if let Ok(v) = env::var("SW_WAL_ENABLED") {
            config.point_lookup.wal_enabled = v.to_lowercase() == "true" || v == "1";
        }
        if let Ok(prefix) = env::var("SW_STATE_DIR_PREFIX") {
            if !prefix.is_empty() {
                config.directory_prefix = prefix;
            }
        }

        config
    }

    /// Set the engine profile.
    pub fn with_profile(mut self, profile: EngineProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the memtable size for prefix partitions.
    pub fn with_bulk_memtable_size(mut self, bytes: usize) -> Self {
        self.bulk_load.memtable_size = bytes;
        self
    }

    /// Set the number of memtables for prefix partitions.
    pub fn with_bulk_memtable_number(mut self, number: i32) -> Self {
        self.bulk_load.memtable_number = number;
        self
    }

    /// Set the compaction parallelism for prefix partitions.
    pub fn with_sub_compactions(mut self, threads: u32) -> Self {
        self.bulk_load.sub_compactions = threads;
        self
    }

    /// Set the bloom filter bits for both partition kinds.
    pub fn with_bloom_filter_bits(mut self, bits: u32) -> Self {
        self.bulk_load.bloom_filter_bits = bits;
        self.point_lookup.bloom_filter_bits = bits;
        self
    }

    /// Set the block cache size for point partitions.
    pub fn with_block_cache_size(mut self, bytes: usize) -> Self {
        self.point_lookup.block_cache_size = bytes;
        self
    }

    /// Enable or disable the WAL for point partitions.
    pub fn with_wal(mut self, enabled: bool) -> Self {
        self.point_lookup.wal_enabled = enabled;
        self
    }

    /// Set the job directory prefix.
    pub fn with_directory_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.directory_prefix = prefix.into();
        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> StateResult<()> {
        let fail = |msg: &str| Err(StateError::Config(msg.to_string()));

        if self.bulk_load.memtable_size == 0 || self.point_lookup.memtable_size == 0 {
            return fail("memtable size must be non-zero");
        }
        if self.bulk_load.memtable_number < 1 || self.point_lookup.memtable_number < 1 {
            return fail("memtable number must be at least 1");
        }
        if self.bulk_load.bloom_filter_bits == 0 || self.point_lookup.bloom_filter_bits == 0 {
            return fail("bloom filter bits must be non-zero");
        }
        if self.bulk_load.num_levels < 1 {
            return fail("num_levels must be at least 1");
        }
        if self.bulk_load.sub_compactions == 0 {
            return fail("sub_compactions must be at least 1");
        }
        if self.directory_prefix.is_empty() {
            return fail("directory prefix must not be empty");
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
