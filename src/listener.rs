//! # Listener Task
//!
//! Background thread draining the datagram endpoint. Dispatches ACK, FIN,
//! FIN-ACK, and DATA packets; silently drops anything that fails to decode.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::wire::Packet;
use crate::stream::Shared;

/// Runs until `shared.closed` is set and `stop_recv()` unblocks the pending read.
pub fn run(shared: Arc<Shared>) {
    loop {
        if shared.closed.load(Ordering::Acquire) {
            tracing::debug!("listener task exiting");
            return;
        }

        let (raw, _addr) = match shared.endpoint.recv_from() {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "recv_from failed, listener exiting");
                return;
            }
        };

        if raw.is_empty() {
            continue;
        }

        let pkt = match Packet::decode(&raw) {
            Ok(pkt) => pkt,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable packet");
                match e {
                    crate::error::DecodeError::Corrupt => shared.stats.record_corrupt(),
                    crate::error::DecodeError::Truncated => shared.stats.record_corrupt(),
                }
                continue;
            }
        };

        shared.stats.record_received();

        if pkt.is_ack() {
            shared
                .acked_high_watermark
                .fetch_max(pkt.seq_n as i64, Ordering::AcqRel);
            if pkt.is_fin() {
                tracing::debug!(seq_n = pkt.seq_n, "observed FIN-ACK");
                // Marks CLOSING only: the reassembly buffer stays open until
                // the local close() handshake actually completes, so data
                // reordered ahead of this FIN-ACK can still be drained.
                shared.should_close.store(true, Ordering::Release);
            }
            continue;
        }

        if pkt.is_fin() {
            tracing::debug!(seq_n = pkt.seq_n, "observed peer FIN");
            let reply = Packet::fin_ack(pkt.seq_n).encode();
            if let Err(e) = shared.endpoint.send_to(&reply, shared.remote_addr) {
                tracing::warn!(error = %e, "failed to send FIN-ACK");
            }
            // As above: CLOSING only, not EOF. `RsStream::close()` is what
            // closes the reassembly buffer once shutdown is actually underway.
            shared.should_close.store(true, Ordering::Release);
            continue;
        }

        let expected = shared.recv_expect_seq_n.load(Ordering::Acquire);
        if pkt.seq_n < expected {
            tracing::trace!(seq_n = pkt.seq_n, "dropping duplicate data packet");
            shared.stats.record_duplicate();
            // Re-ack for robustness: the peer's original ack was likely lost,
            // which is why it retransmitted in the first place.
            let ack = Packet::ack(pkt.seq_n).encode();
            let _ = shared.endpoint.send_to(&ack, shared.remote_addr);
            continue;
        }

        shared.reassembly.offer(pkt);
    }
}
