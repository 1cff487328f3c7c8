//! # Sender Task
//!
//! Background thread that drains the send queue into the in-flight tracker,
//! transmits, and retransmits everything in flight on a head-of-line
//! timeout (go-back-N).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::inflight::InflightTracker;
use crate::stream::Shared;

/// How long the sender blocks on the queue before re-checking timers.
const TICK_INTERVAL: Duration = Duration::from_millis(20);

/// A DATA or FIN packet queued by the facade, already wire-encoded.
pub struct QueuedPacket {
    pub seq_n: u32,
    pub wire_bytes: Bytes,
}

/// Runs until `shared.closed` is set, the queue is drained, and the in-flight
/// tracker has emptied.
pub fn run(shared: Arc<Shared>, rx: Receiver<QueuedPacket>, window: usize, timeout: Duration) {
    let mut tracker = InflightTracker::new(window, timeout);
    let mut disconnected = false;

    loop {
        while tracker.has_capacity() {
            match rx.try_recv() {
                Ok(packet) => {
                    transmit(&shared, &packet.wire_bytes);
                    tracker.insert(packet.seq_n, packet.wire_bytes);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if let Some(watermark) = current_watermark(&shared) {
            tracker.gc(watermark);
        }

        if let Some(retransmit_set) = tracker.check_timeout() {
            tracing::debug!(count = retransmit_set.len(), "go-back-n retransmit");
            shared.stats.record_retransmitted(retransmit_set.len());
            for wire_bytes in &retransmit_set {
                transmit(&shared, wire_bytes);
            }
        }

        let closed = shared.closed.load(Ordering::Acquire);
        if (closed || disconnected) && tracker.is_empty() {
            tracing::debug!("sender task exiting");
            return;
        }

        if tracker.has_capacity() && !disconnected {
            // Block briefly so a freshly queued packet wakes us promptly
            // without busy-spinning while the window has room.
            match rx.recv_timeout(TICK_INTERVAL) {
                Ok(packet) => {
                    transmit(&shared, &packet.wire_bytes);
                    tracker.insert(packet.seq_n, packet.wire_bytes);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => disconnected = true,
            }
        } else {
            std::thread::sleep(TICK_INTERVAL);
        }
    }
}

fn current_watermark(shared: &Shared) -> Option<u32> {
    let w = shared.acked_high_watermark.load(Ordering::Acquire);
    if w < 0 {
        None
    } else {
        Some(w as u32)
    }
}

fn transmit(shared: &Shared, wire_bytes: &[u8]) {
    match shared.endpoint.send_to(wire_bytes, shared.remote_addr) {
        Ok(()) => shared.stats.record_sent(wire_bytes.len()),
        Err(e) => tracing::warn!(error = %e, "send_to failed"),
    }
}
