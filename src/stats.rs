//! # Stream Statistics
//!
//! Per-stream counters, exposed read-only for diagnostics and JSON export.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lock-free accumulator shared between the background tasks and the facade.
#[derive(Debug, Default)]
pub struct StatsCounters {
    packets_sent: AtomicU64,
    packets_retransmitted: AtomicU64,
    bytes_sent: AtomicU64,
    packets_received: AtomicU64,
    packets_duplicate: AtomicU64,
    packets_corrupt: AtomicU64,
    bytes_delivered: AtomicU64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_retransmitted(&self, count: usize) {
        self.packets_retransmitted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.packets_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_corrupt(&self) {
        self.packets_corrupt.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self, bytes: usize) {
        self.bytes_delivered.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Snapshot the counters into a plain, serializable struct.
    pub fn snapshot(&self) -> StreamStats {
        StreamStats {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_retransmitted: self.packets_retransmitted.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_duplicate: self.packets_duplicate.load(Ordering::Relaxed),
            packets_corrupt: self.packets_corrupt.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of [`StatsCounters`], safe to serialize or log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamStats {
    pub packets_sent: u64,
    pub packets_retransmitted: u64,
    pub bytes_sent: u64,
    pub packets_received: u64,
    pub packets_duplicate: u64,
    pub packets_corrupt: u64,
    pub bytes_delivered: u64,
}

impl StreamStats {
    /// Fraction of sent packets that were retransmissions.
    pub fn retransmit_ratio(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            self.packets_retransmitted as f64 / self.packets_sent as f64
        }
    }

    /// Fraction of received packets that were duplicates.
    pub fn duplicate_ratio(&self) -> f64 {
        if self.packets_received == 0 {
            0.0
        } else {
            self.packets_duplicate as f64 / self.packets_received as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratios_are_zero_with_no_traffic() {
        let s = StreamStats::default();
        assert_eq!(s.retransmit_ratio(), 0.0);
        assert_eq!(s.duplicate_ratio(), 0.0);
    }

    #[test]
    fn counters_accumulate_and_snapshot() {
        let c = StatsCounters::new();
        c.record_sent(10);
        c.record_sent(10);
        c.record_retransmitted(1);
        c.record_received();
        c.record_duplicate();
        c.record_corrupt();
        c.record_delivered(10);

        let snap = c.snapshot();
        assert_eq!(snap.packets_sent, 2);
        assert_eq!(snap.bytes_sent, 20);
        assert_eq!(snap.packets_retransmitted, 1);
        assert_eq!(snap.packets_received, 1);
        assert_eq!(snap.packets_duplicate, 1);
        assert_eq!(snap.packets_corrupt, 1);
        assert_eq!(snap.bytes_delivered, 10);
        assert_eq!(snap.retransmit_ratio(), 0.5);
        assert_eq!(snap.duplicate_ratio(), 1.0);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let c = StatsCounters::new();
        c.record_sent(10);
        c.record_retransmitted(1);
        c.record_received();

        let snap = c.snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let back: StreamStats = serde_json::from_str(&json).unwrap();

        assert_eq!(back.packets_sent, snap.packets_sent);
        assert_eq!(back.packets_retransmitted, snap.packets_retransmitted);
        assert_eq!(back.packets_received, snap.packets_received);
    }
}
