use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use serde::{Serialize, Deserialize};

/// Running counters for one index instance
#[derive(Debug, Default)]
pub struct IndexStats {
    updates: AtomicU64,
    deletes: AtomicU64,
    batches: AtomicU64,
    errors: AtomicU64,
    counter_underflows: AtomicU64,
    analysis_time_ns: AtomicU64,
    index_time_ns: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatsSnapshot {
    pub updates: u64,
    pub deletes: u64,
    pub batches: u64,
    pub errors: u64,
    /// Dictionary counters that would have gone below zero
    pub counter_underflows: u64,
    pub analysis_time_ns: u64,
    pub index_time_ns: u64,
}

impl IndexStats {
    pub fn new() -> Self {
        IndexStats::default()
    }

    pub fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_counter_underflow(&self) {
        self.counter_underflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_analysis_time(&self, elapsed: Duration) {
        self.analysis_time_ns.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn add_index_time(&self, elapsed: Duration) {
        self.index_time_ns.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IndexStatsSnapshot {
        IndexStatsSnapshot {
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            counter_underflows: self.counter_underflows.load(Ordering::Relaxed),
            analysis_time_ns: self.analysis_time_ns.load(Ordering::Relaxed),
            index_time_ns: self.index_time_ns.load(Ordering::Relaxed),
        }
    }
}
