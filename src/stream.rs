//! # Stream Facade
//!
//! Public entry point: [`RsStream::connect`], [`RsStream::send`],
//! [`RsStream::recv`], [`RsStream::close`]. Owns the sequence counters and
//! shutdown flags, and joins the listener/sender background threads.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::Sender as ChannelSender;
use quanta::Clock;

use crate::datagram::{Datagram, UdpDatagram};
use crate::error::{StreamError, StreamResult};
use crate::inflight::{DEFAULT_RETRANSMIT_TIMEOUT, DEFAULT_WINDOW};
use crate::reassembly::ReassemblyBuffer;
use crate::sender::QueuedPacket;
use crate::stats::{StatsCounters, StreamStats};
use crate::wire::{Packet, PAYLOAD_MAX};
use crate::{listener, sender};

/// Default time to wait for the peer's FIN-ACK before giving up on a clean close.
pub const DEFAULT_FIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How often `recv`'s blocking wait re-checks shutdown state.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Tunables for a single stream. Constructed in code; never parsed from the
/// environment or a config file.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum number of unacknowledged packets in flight at once.
    pub window: usize,
    /// Per-packet retransmission timeout.
    pub retransmit_timeout: Duration,
    /// How long `close()` waits for the peer's FIN-ACK.
    pub fin_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            window: DEFAULT_WINDOW,
            retransmit_timeout: DEFAULT_RETRANSMIT_TIMEOUT,
            fin_timeout: DEFAULT_FIN_TIMEOUT,
        }
    }
}

/// State shared between the facade and the listener/sender background
/// threads. Scalars are atomics rather than fields behind a single lock so
/// the three threads never contend on one mutex for unrelated reasons.
pub(crate) struct Shared {
    pub endpoint: Arc<dyn Datagram>,
    pub remote_addr: SocketAddr,
    pub send_next_seq_n: AtomicU32,
    pub recv_expect_seq_n: AtomicU32,
    /// -1 means "nothing acknowledged yet"; otherwise the highest acked `seq_n`.
    pub acked_high_watermark: AtomicI64,
    pub closed: AtomicBool,
    pub should_close: AtomicBool,
    pub reassembly: ReassemblyBuffer,
    pub stats: StatsCounters,
}

/// A reliable, in-order, integrity-checked byte stream over an unreliable
/// datagram endpoint.
pub struct RsStream {
    shared: Arc<Shared>,
    send_tx: ChannelSender<QueuedPacket>,
    fin_timeout: Duration,
    close_started: AtomicBool,
    listener_handle: Mutex<Option<JoinHandle<()>>>,
    sender_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RsStream {
    /// Bind `local_addr`, pair with `remote_addr`, and start the background
    /// listener and sender threads. `local_addr` may use port 0 for an
    /// ephemeral port and the unspecified address for a wildcard bind.
    pub fn connect(local_addr: SocketAddr, remote_addr: SocketAddr) -> StreamResult<Self> {
        Self::connect_with_config(local_addr, remote_addr, StreamConfig::default())
    }

    pub fn connect_with_config(
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        config: StreamConfig,
    ) -> StreamResult<Self> {
        let endpoint = Arc::new(UdpDatagram::bind(local_addr)?);
        Self::with_endpoint(endpoint, remote_addr, config)
    }

    /// Construct a stream over a caller-supplied [`Datagram`] implementation.
    /// Production callers want [`RsStream::connect`]; this exists so tests
    /// can substitute an in-process lossy double.
    pub fn with_endpoint(
        endpoint: Arc<dyn Datagram>,
        remote_addr: SocketAddr,
        config: StreamConfig,
    ) -> StreamResult<Self> {
        let shared = Arc::new(Shared {
            endpoint,
            remote_addr,
            send_next_seq_n: AtomicU32::new(0),
            recv_expect_seq_n: AtomicU32::new(0),
            acked_high_watermark: AtomicI64::new(-1),
            closed: AtomicBool::new(false),
            should_close: AtomicBool::new(false),
            reassembly: ReassemblyBuffer::new(),
            stats: StatsCounters::new(),
        });

        let (send_tx, send_rx) = crossbeam_channel::unbounded::<QueuedPacket>();

        let listener_shared = shared.clone();
        let listener_handle = thread::Builder::new()
            .name("relstream-listener".into())
            .spawn(move || listener::run(listener_shared))?;

        let sender_shared = shared.clone();
        let window = config.window;
        let retransmit_timeout = config.retransmit_timeout;
        let sender_handle = thread::Builder::new()
            .name("relstream-sender".into())
            .spawn(move || sender::run(sender_shared, send_rx, window, retransmit_timeout))?;

        Ok(RsStream {
            shared,
            send_tx,
            fin_timeout: config.fin_timeout,
            close_started: AtomicBool::new(false),
            listener_handle: Mutex::new(Some(listener_handle)),
            sender_handle: Mutex::new(Some(sender_handle)),
        })
    }

    /// Segment `bytes` into payload-sized chunks and enqueue them. Returns
    /// once the bytes are queued, not once they are acknowledged.
    pub fn send(&self, bytes: &[u8]) -> StreamResult<()> {
        if self.is_closed() {
            return Err(StreamError::Closed);
        }

        for chunk in bytes.chunks(PAYLOAD_MAX.max(1)) {
            let seq_n = self.shared.send_next_seq_n.fetch_add(1, Ordering::AcqRel);
            let pkt = Packet::data(seq_n, chunk.len() as u32, Bytes::copy_from_slice(chunk));
            let wire_bytes = pkt.encode().freeze();
            self.send_tx
                .send(QueuedPacket { seq_n, wire_bytes })
                .map_err(|_| StreamError::Closed)?;
        }
        Ok(())
    }

    /// Block until the next in-order payload is available, the stream has
    /// fully closed, or a fatal I/O error occurs.
    pub fn recv(&self) -> StreamResult<Vec<u8>> {
        loop {
            let expected = self.shared.recv_expect_seq_n.load(Ordering::Acquire);
            match self.shared.reassembly.take_blocking(expected, RECV_POLL_INTERVAL) {
                Some(pkt) => {
                    debug_assert_eq!(pkt.seq_n, expected);
                    self.shared.recv_expect_seq_n.fetch_add(1, Ordering::AcqRel);
                    self.shared.stats.record_delivered(pkt.payload.len());

                    let ack = Packet::ack(pkt.seq_n).encode();
                    if let Err(e) = self.shared.endpoint.send_to(&ack, self.shared.remote_addr) {
                        tracing::warn!(error = %e, "failed to ack consumed packet");
                    }
                    return Ok(pkt.payload.to_vec());
                }
                None => {
                    // should_close only means a peer FIN/FIN-ACK was seen,
                    // not that every packet sent before it has arrived — a
                    // reordered network can still deliver earlier DATA.
                    // EOF is only valid once this side's own close() has
                    // run and closed the reassembly buffer.
                    if self.is_closed() {
                        return Ok(Vec::new());
                    }
                }
            }
        }
    }

    /// Idempotent orderly shutdown. Pushes a FIN through the send path,
    /// waits (bounded by the FIN timeout) for the peer's FIN-ACK, sends a
    /// final ACK, then joins the background threads.
    pub fn close(&self) -> StreamResult<()> {
        if self.close_started.swap(true, Ordering::AcqRel) {
            self.join_threads();
            return Ok(());
        }

        if !self.shared.should_close.load(Ordering::Acquire) {
            let seq_n = self.shared.send_next_seq_n.fetch_add(1, Ordering::AcqRel);
            let wire_bytes = Packet::fin(seq_n).encode().freeze();
            let _ = self.send_tx.send(QueuedPacket { seq_n, wire_bytes });

            let clock = Clock::new();
            let start = clock.now();
            while !self.shared.should_close.load(Ordering::Acquire) {
                if clock.now().duration_since(start) > self.fin_timeout {
                    tracing::warn!("peer did not acknowledge close within timeout");
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }

            let ack = Packet::ack(seq_n).encode();
            let _ = self.shared.endpoint.send_to(&ack, self.shared.remote_addr);
        }

        self.shared.closed.store(true, Ordering::Release);
        self.shared.reassembly.close();
        self.shared.endpoint.stop_recv();
        self.join_threads();
        Ok(())
    }

    /// Read-only diagnostic snapshot of per-stream counters.
    pub fn stats(&self) -> StreamStats {
        self.shared.stats.snapshot()
    }

    pub fn local_addr(&self) -> StreamResult<SocketAddr> {
        self.shared.endpoint.local_addr().map_err(Into::into)
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn join_threads(&self) {
        if let Some(handle) = self.listener_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.sender_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}
