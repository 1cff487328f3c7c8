//! # In-Flight Tracker
//!
//! Sender-owned, ordered collection of transmitted-but-unacknowledged
//! packets. Garbage collection and the go-back-N timeout check both walk the
//! map in `seq_n` order, matching the design's "retransmit everything on a
//! single head timeout" policy.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use quanta::{Clock, Instant};

/// Default maximum number of unacknowledged packets in flight at once.
pub const DEFAULT_WINDOW: usize = 25;

/// Default per-packet retransmission timeout.
pub const DEFAULT_RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(250);

/// A packet transmitted at least once and not yet known-acknowledged.
#[derive(Debug, Clone)]
pub struct InflightPacket {
    pub seq_n: u32,
    pub start_time: Instant,
    pub timeout: Duration,
    pub wire_bytes: Bytes,
}

/// Ordered map of in-flight packets plus the admission/timeout policy.
pub struct InflightTracker {
    clock: Clock,
    entries: BTreeMap<u32, InflightPacket>,
    window: usize,
    timeout: Duration,
}

impl InflightTracker {
    pub fn new(window: usize, timeout: Duration) -> Self {
        InflightTracker {
            clock: Clock::new(),
            entries: BTreeMap::new(),
            window,
            timeout,
        }
    }

    /// Number of packets currently in flight.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether there is room to admit another packet under the window cap.
    pub fn has_capacity(&self) -> bool {
        self.entries.len() < self.window
    }

    /// Record a freshly transmitted packet.
    pub fn insert(&mut self, seq_n: u32, wire_bytes: Bytes) {
        self.entries.insert(
            seq_n,
            InflightPacket {
                seq_n,
                start_time: self.clock.now(),
                timeout: self.timeout,
                wire_bytes,
            },
        );
    }

    /// Drop every entry with `seq_n <= watermark`. Returns the number removed.
    pub fn gc(&mut self, watermark: u32) -> usize {
        let to_drop: Vec<u32> = self
            .entries
            .range(..=watermark)
            .map(|(&seq, _)| seq)
            .collect();
        for seq in &to_drop {
            self.entries.remove(seq);
        }
        to_drop.len()
    }

    /// If the oldest in-flight packet has exceeded its timeout, refresh every
    /// entry's `start_time` and return the wire bytes to retransmit, in
    /// ascending `seq_n` order. Returns `None` if nothing has timed out
    /// (including the empty-tracker case).
    pub fn check_timeout(&mut self) -> Option<Vec<Bytes>> {
        let head_elapsed = self
            .entries
            .values()
            .next()
            .map(|p| self.clock.now().duration_since(p.start_time) > p.timeout)
            .unwrap_or(false);

        if !head_elapsed {
            return None;
        }

        let now = self.clock.now();
        let mut out = Vec::with_capacity(self.entries.len());
        for entry in self.entries.values_mut() {
            entry.start_time = now;
            out.push(entry.wire_bytes.clone());
        }
        Some(out)
    }
}
