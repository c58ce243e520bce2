//! Consumer counters (spec §4.E): processed/error totals plus a per-topic
//! pending-buffer gauge, grounded on the teacher's `WorkerStats` pattern.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    pub processed: AtomicU64,
    pub idempotent_hits: AtomicU64,
    pub errors: AtomicU64,
    pub dead_lettered: AtomicU64,
    buffer_depth: DashMap<String, AtomicU64>,
}

impl ConsumerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idempotent_hit(&self) {
        self.idempotent_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_buffer_depth(&self, topic: &str, depth: u64) {
        self.buffer_depth
            .entry(topic.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .store(depth, Ordering::Relaxed);
    }

    pub fn buffer_depth(&self, topic: &str) -> u64 {
        self.buffer_depth
            .get(topic)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> ConsumerMetricsSnapshot {
        ConsumerMetricsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            idempotent_hits: self.idempotent_hits.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerMetricsSnapshot {
    pub processed: u64,
    pub idempotent_hits: u64,
    pub errors: u64,
    pub dead_lettered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = ConsumerMetrics::new();
        assert_eq!(metrics.snapshot(), ConsumerMetricsSnapshot::default());
    }

    #[test]
    fn buffer_depth_is_per_topic() {
        let metrics = ConsumerMetrics::new();
        metrics.set_buffer_depth("emails", 5);
        metrics.set_buffer_depth("contacts", 1);
        assert_eq!(metrics.buffer_depth("emails"), 5);
        assert_eq!(metrics.buffer_depth("contacts"), 1);
        assert_eq!(metrics.buffer_depth("unknown"), 0);
    }
}
