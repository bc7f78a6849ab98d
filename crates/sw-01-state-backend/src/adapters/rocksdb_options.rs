//! # RocksDB Options
//!
//! Translates [`StateBackendConfig`] into engine options.
//!
//! ## Database profiles
//!
//! Both profiles use single-writer memtables: prefix partitions run on the
//! vector memtable, which rejects concurrent inserts at partition creation.
//!
//! - Bulk load: `prepare_for_bulk_load` (auto compaction off, huge L0
//!   triggers), parallel sub-compactions for the one manual compaction per
//!   partition.
//! - Point lookup: stock options otherwise.
//!
//! ## Partition options
//!
//! - Prefix partitions: vector memtable for sequential inserts, hash-search
//!   index over the group prefix, prefix bloom filter, two levels.
//! - Point partitions: skiplist memtable, shared LRU block cache with pinned L0
//!   filter/index blocks, whole-key bloom filter.
//!
//! The WAL is disabled for prefix writes and, unless configured otherwise, for
//! point writes. State is ephemeral and rebuilt on job restart.

use crate::domain::config::{EngineProfile, StateBackendConfig};
use crate::domain::keys::{prefix_extractor, prefix_in_domain};
use rocksdb::{
    BlockBasedIndexType, BlockBasedOptions, BottommostLevelCompaction, Cache, CompactOptions,
    FlushOptions, MemtableFactory, Options, ReadOptions, SliceTransform, WriteOptions,
};

const PREFIX_EXTRACTOR_NAME: &str = "spillway.group_prefix";

/// Engine option factory for one handle.
///
/// Owns the block cache so every point partition of the job shares it.
pub struct EngineOptions {
    config: StateBackendConfig,
    block_cache: Cache,
}

impl EngineOptions {
    pub fn new(config: StateBackendConfig) -> Self {
        let block_cache = Cache::new_lru_cache(config.point_lookup.block_cache_size);
        Self {
            config,
            block_cache,
        }
    }

    pub fn config(&self) -> &StateBackendConfig {
        &self.config
    }

    /// Database-wide options for the configured profile.
    pub fn db_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        match self.config.profile {
            EngineProfile::BulkLoad => {
                opts.prepare_for_bulk_load();
                opts.set_max_subcompactions(self.config.bulk_load.sub_compactions);
            }
            EngineProfile::PointLookup => {}
        }
        opts.set_allow_concurrent_memtable_write(false);

        opts
    }

    /// Column family options for a prefix partition.
    pub fn prefix_partition_options(&self) -> Options {
        let bulk = &self.config.bulk_load;
        let mut opts = Options::default();
        opts.prepare_for_bulk_load();
        opts.set_num_levels(bulk.num_levels);
        opts.set_write_buffer_size(bulk.memtable_size);
        opts.set_max_write_buffer_number(bulk.memtable_number);
        opts.set_memtable_factory(MemtableFactory::Vector);
        opts.set_prefix_extractor(SliceTransform::create(
            PREFIX_EXTRACTOR_NAME,
            prefix_extractor,
            Some(prefix_in_domain),
        ));

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_index_type(BlockBasedIndexType::HashSearch);
        block_opts.set_bloom_filter(f64::from(bulk.bloom_filter_bits), false);
        block_opts.set_whole_key_filtering(false);
        opts.set_block_based_table_factory(&block_opts);

        opts
    }

    /// Column family options for a point partition.
    pub fn point_partition_options(&self) -> Options {
        let point = &self.config.point_lookup;
        let mut opts = Options::default();
        opts.set_write_buffer_size(point.memtable_size);
        opts.set_max_write_buffer_number(point.memtable_number);

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_cache(&self.block_cache);
        block_opts.set_pin_l0_filter_and_index_blocks_in_cache(true);
        block_opts.set_bloom_filter(f64::from(point.bloom_filter_bits), false);
        opts.set_block_based_table_factory(&block_opts);

        opts
    }

    /// Writes into prefix partitions: no WAL, fail fast instead of stalling.
    pub fn prefix_write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.disable_wal(true);
        opts.set_no_slowdown(true);
        opts
    }

    /// Writes into point partitions.
    pub fn point_write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.disable_wal(!self.config.point_lookup.wal_enabled);
        opts
    }

    /// Full scans: ignore the prefix extractor.
    pub fn scan_read_options() -> ReadOptions {
        let mut opts = ReadOptions::default();
        opts.set_total_order_seek(true);
        opts
    }

    /// Point reads.
    pub fn point_read_options() -> ReadOptions {
        ReadOptions::default()
    }

    /// Flushes block until the memtables are on disk.
    pub fn flush_options() -> FlushOptions {
        let mut opts = FlushOptions::default();
        opts.set_wait(true);
        opts
    }

    /// Manual compaction rewriting every level down to the bottom.
    pub fn compact_options() -> CompactOptions {
        let mut opts = CompactOptions::default();
        opts.set_exclusive_manual_compaction(true);
        opts.set_bottommost_level_compaction(BottommostLevelCompaction::Force);
        opts
    }
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
