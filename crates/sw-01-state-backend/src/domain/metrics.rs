//! # State Backend Metrics
//!
//! Counters shared by a handle and every partition it allocated.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one job's state backend
#[derive(Debug, Default)]
pub struct StateMetrics {
    partitions_created: AtomicU64,
    partitions_released: AtomicU64,
    appends: AtomicU64,
    append_rejections: AtomicU64,
    compactions: AtomicU64,
    compaction_millis: AtomicU64,
}

impl StateMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_partition_created(&self) {
        self.partitions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_partition_released(&self) {
        self.partitions_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_append(&self, accepted: bool) {
        if accepted {
            self.appends.fetch_add(1, Ordering::Relaxed);
        } else {
            self.append_rejections.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_compaction(&self, duration_ms: u64) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
        self.compaction_millis
            .fetch_add(duration_ms, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            partitions_created: self.partitions_created.load(Ordering::Relaxed),
            partitions_released: self.partitions_released.load(Ordering::Relaxed),
            appends: self.appends.load(Ordering::Relaxed),
            append_rejections: self.append_rejections.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
            compaction_millis: self.compaction_millis.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`StateMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub partitions_created: u64,
    pub partitions_released: u64,
    pub appends: u64,
    pub append_rejections: u64,
    pub compactions: u64,
    pub compaction_millis: u64,
}

impl MetricsSnapshot {
    /// Partitions allocated and not yet released.
    pub fn live_partitions(&self) -> u64 {
        self.partitions_created
            .saturating_sub(self.partitions_released)
    }
}
