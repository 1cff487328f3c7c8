//! # Datagram Transport
//!
//! The unreliable packet-send/receive abstraction the rest of the crate is
//! built on. Production code uses [`UdpDatagram`], a thin wrapper around
//! `std::net::UdpSocket`; tests substitute an in-process double that can
//! drop, duplicate, reorder, and corrupt packets on purpose (see
//! `tests/integration.rs`).

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How often the listener's blocking read times out to check for shutdown.
///
/// Keeping this short bounds the latency between `stop_recv()` and the
/// listener thread actually observing it.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Contract the background tasks depend on. Implementors must make
/// `recv_from` block until either a datagram arrives or `stop_recv` is
/// called from another thread.
pub trait Datagram: Send + Sync {
    /// Send `buf` to `addr`. Best-effort; the implementation may drop it.
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<()>;

    /// Block until a datagram arrives (or `stop_recv` unblocks it). Returns
    /// an empty buffer to signal "no data, check shutdown state".
    fn recv_from(&self) -> io::Result<(Vec<u8>, SocketAddr)>;

    /// Unblock any thread currently parked in `recv_from`.
    fn stop_recv(&self);

    /// The address this endpoint is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// `std::net::UdpSocket`-backed [`Datagram`] implementation.
pub struct UdpDatagram {
    socket: UdpSocket,
    stopped: AtomicBool,
}

impl UdpDatagram {
    /// Bind a new UDP endpoint at `local_addr`.
    pub fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local_addr)?;
        socket.set_read_timeout(Some(READ_POLL_INTERVAL))?;
        Ok(UdpDatagram {
            socket,
            stopped: AtomicBool::new(false),
        })
    }
}

impl Datagram for UdpDatagram {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<()> {
        self.socket.send_to(buf, addr).map(|_| ())
    }

    fn recv_from(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; crate::wire::DATAGRAM_MAX];
        loop {
            if self.stopped.load(Ordering::Acquire) {
                return Ok((Vec::new(), self.socket.local_addr()?));
            }
            match self.socket.recv_from(&mut buf) {
                Ok((n, addr)) => return Ok((buf[..n].to_vec(), addr)),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn stop_recv(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_loopback_ephemeral() {
        let ep = UdpDatagram::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        assert!(ep.local_addr().unwrap().port() > 0);
    }

    #[test]
    fn send_and_receive_loopback() {
        let a = UdpDatagram::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let b = UdpDatagram::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send_to(b"ping", b_addr).unwrap();
        let (data, _from) = b.recv_from().unwrap();
        assert_eq!(data, b"ping");
    }

    #[test]
    fn stop_recv_unblocks_pending_read() {
        use std::sync::Arc;
        use std::thread;

        let ep = Arc::new(UdpDatagram::bind("127.0.0.1:0".parse().unwrap()).unwrap());
        let ep2 = ep.clone();
        let handle = thread::spawn(move || ep2.recv_from().unwrap());

        thread::sleep(Duration::from_millis(100));
        ep.stop_recv();

        let (data, _) = handle.join().unwrap();
        assert!(data.is_empty());
    }
}
