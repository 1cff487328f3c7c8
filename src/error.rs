//! Error types for wire decoding and stream-level failures.

use std::io;
use std::sync::Arc;

/// Failure modes of [`crate::wire::Packet::decode`].
///
/// Both variants are handled identically by the listener (silent drop,
/// recovery via retransmission) — they are distinguished only so callers can
/// attribute statistics and log messages correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Digest mismatch: the packet was corrupted in transit.
    #[error("packet failed digest verification")]
    Corrupt,
    /// Buffer shorter than the fixed header + digest region.
    #[error("packet shorter than header + digest")]
    Truncated,
}

/// Failure modes surfaced to callers of the [`crate::stream::RsStream`] facade.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// The stream has already been closed; no further `send`/`recv` is possible.
    #[error("stream is closed")]
    Closed,
    /// A fatal I/O error on the underlying datagram endpoint.
    #[error("datagram I/O error: {0}")]
    Io(Arc<io::Error>),
    /// The peer never acknowledged our FIN within the close timeout.
    #[error("peer did not acknowledge close within timeout")]
    ClosePeerLost,
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        StreamError::Io(Arc::new(e))
    }
}

pub type StreamResult<T> = Result<T, StreamError>;
