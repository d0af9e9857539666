//! Poll counters shared between the poller and the stats endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running totals since process start.
#[derive(Debug, Default)]
pub struct PollStats {
    cycles: AtomicU64,
    cycle_failures: AtomicU64,
    cycle_timeouts: AtomicU64,
    delivered: AtomicU64,
    extraction_failures: AtomicU64,
    publish_failures: AtomicU64,
    mark_failures: AtomicU64,
}

/// Point-in-time copy of [`PollStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub cycle_failures: u64,
    pub cycle_timeouts: u64,
    pub delivered: u64,
    pub extraction_failures: u64,
    pub publish_failures: u64,
    pub mark_failures: u64,
}

impl PollStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle_failure(&self) {
        self.cycle_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle_timeout(&self) {
        self.cycle_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_extraction_failure(&self) {
        self.extraction_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mark_failure(&self) {
        self.mark_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            cycle_failures: self.cycle_failures.load(Ordering::Relaxed),
            cycle_timeouts: self.cycle_timeouts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            mark_failures: self.mark_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counts() {
        let stats = PollStats::new();
        stats.record_cycle();
        stats.record_delivered();
        stats.record_delivered();
        stats.record_mark_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cycles, 1);
        assert_eq!(snapshot.delivered, 2);
        assert_eq!(snapshot.mark_failures, 1);
        assert_eq!(snapshot.publish_failures, 0);
    }
}
