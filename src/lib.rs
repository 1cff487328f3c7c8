//! # relstream
//!
//! A reliable, in-order, integrity-checked byte-stream transport built on
//! top of an unreliable datagram service that may drop, reorder, duplicate,
//! or corrupt packets.
//!
//! Segmentation, acknowledgement, retransmission, duplicate suppression,
//! in-order delivery, and an orderly two-way close are all handled
//! internally by a background listener thread and a background sender
//! thread; the public surface is [`RsStream`].
//!
//! ## Crate structure
//!
//! - [`wire`] — packet header/digest serialization and parsing
//! - [`reassembly`] — receiver-side priority buffer keyed by sequence number
//! - [`inflight`] — sender-side unacknowledged-packet tracker and go-back-N timeout
//! - [`datagram`] — the unreliable transport abstraction (`UdpSocket`-backed in production)
//! - [`listener`] — background thread dispatching received packets
//! - [`sender`] — background thread draining the send queue and retransmitting
//! - [`stream`] — the public facade
//! - [`stats`] — per-stream counters for diagnostics
//! - [`error`] — decode and stream error types

pub mod datagram;
pub mod error;
pub mod inflight;
pub mod listener;
pub mod reassembly;
pub mod sender;
pub mod stats;
pub mod stream;
pub mod wire;

pub use datagram::{Datagram, UdpDatagram};
pub use error::{DecodeError, StreamError, StreamResult};
pub use stats::StreamStats;
pub use stream::{RsStream, StreamConfig};
