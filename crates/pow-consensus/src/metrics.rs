//! Metrics collection for proof-of-work consensus

use crate::domain::Verdict;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector
#[derive(Debug, Default)]
pub struct Metrics {
    /// Rounds entered via `start_block`
    pub rounds_started: AtomicU64,

    /// Blocks mined locally
    pub blocks_mined: AtomicU64,

    /// Peer blocks adopted
    pub blocks_adopted: AtomicU64,

    /// Blocks executed and appended
    pub blocks_committed: AtomicU64,

    /// Own broadcasts rejected on the way back
    pub echoes_rejected: AtomicU64,

    /// Announcements for another height
    pub stale_rejected: AtomicU64,

    /// Announcements with a bad proof or body
    pub invalid_rejected: AtomicU64,

    /// Announcements that failed to decode
    pub undecodable: AtomicU64,

    /// Messages evicted from a full queue
    pub queue_drops: AtomicU64,

    /// Total PoW mining time (milliseconds)
    pub mining_time_ms: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Rounds entered via `start_block`
    pub rounds_started: u64,
    /// Blocks mined locally
    pub blocks_mined: u64,
    /// Peer blocks adopted
    pub blocks_adopted: u64,
    /// Blocks executed and appended
    pub blocks_committed: u64,
    /// Own broadcasts rejected
    pub echoes_rejected: u64,
    /// Announcements for another height
    pub stale_rejected: u64,
    /// Announcements with a bad proof or body
    pub invalid_rejected: u64,
    /// Announcements that failed to decode
    pub undecodable: u64,
    /// Messages evicted from a full queue
    pub queue_drops: u64,
    /// Total PoW mining time (milliseconds)
    pub mining_time_ms: u64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a round start
    pub fn record_round_started(&self) {
        self.rounds_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a locally mined block and how long the search took
    pub fn record_block_mined(&self, duration_ms: u64) {
        self.blocks_mined.fetch_add(1, Ordering::Relaxed);
        self.mining_time_ms.fetch_add(duration_ms, Ordering::Relaxed);
    }

    /// Record a committed block
    pub fn record_block_committed(&self) {
        self.blocks_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a queue eviction
    pub fn record_queue_drop(&self) {
        self.queue_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the decision for one announcement
    pub fn record_verdict(&self, verdict: Verdict) {
        let counter = match verdict {
            Verdict::Adopted => &self.blocks_adopted,
            Verdict::Echo => &self.echoes_rejected,
            Verdict::WrongHeight { .. } | Verdict::WrongParent => &self.stale_rejected,
            Verdict::InvalidProof | Verdict::InconsistentBody => &self.invalid_rejected,
            Verdict::Undecodable => &self.undecodable,
            // Not the peer's fault; visible in logs only
            Verdict::ApplyFailed => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Average mining time per mined block (milliseconds)
    pub fn avg_mining_time_ms(&self) -> f64 {
        let blocks = self.blocks_mined.load(Ordering::Relaxed);
        if blocks == 0 {
            return 0.0;
        }
        self.mining_time_ms.load(Ordering::Relaxed) as f64 / blocks as f64
    }

    /// Copy all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rounds_started: self.rounds_started.load(Ordering::Relaxed),
            blocks_mined: self.blocks_mined.load(Ordering::Relaxed),
            blocks_adopted: self.blocks_adopted.load(Ordering::Relaxed),
            blocks_committed: self.blocks_committed.load(Ordering::Relaxed),
            echoes_rejected: self.echoes_rejected.load(Ordering::Relaxed),
            stale_rejected: self.stale_rejected.load(Ordering::Relaxed),
            invalid_rejected: self.invalid_rejected.load(Ordering::Relaxed),
            undecodable: self.undecodable.load(Ordering::Relaxed),
            queue_drops: self.queue_drops.load(Ordering::Relaxed),
            mining_time_ms: self.mining_time_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdicts_map_to_counters() {
        let metrics = Metrics::new();
        metrics.record_verdict(Verdict::Echo);
        metrics.record_verdict(Verdict::WrongHeight { announced: 3 });
        metrics.record_verdict(Verdict::WrongParent);
        metrics.record_verdict(Verdict::InvalidProof);
        metrics.record_verdict(Verdict::InconsistentBody);
        metrics.record_verdict(Verdict::ApplyFailed);

        let snap = metrics.snapshot();
        assert_eq!(snap.echoes_rejected, 1);
        assert_eq!(snap.stale_rejected, 2);
        assert_eq!(snap.invalid_rejected, 2);
        assert_eq!(snap.blocks_adopted, 0);
    }

    #[test]
    fn test_avg_mining_time() {
        let metrics = Metrics::new();
        assert_eq!(metrics.avg_mining_time_ms(), 0.0);

        metrics.record_block_mined(100);
        metrics.record_block_mined(300);
        assert_eq!(metrics.avg_mining_time_ms(), 200.0);
    }
}
