//! # Reassembly Buffer
//!
//! Priority-ordered store of received DATA packets keyed by `seq_n`,
//! smallest-first, with a condvar so `recv` can block instead of spinning.

use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::wire::Packet;

#[derive(Default)]
struct Inner {
    packets: BTreeMap<u32, Packet>,
    /// Set by the facade on close so a blocked `take_blocking` can wake up
    /// and report end-of-stream instead of waiting forever.
    closed: bool,
}

/// Thread-safe priority buffer over received DATA packets.
pub struct ReassemblyBuffer {
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        ReassemblyBuffer {
            inner: Mutex::new(Inner::default()),
            cond: Condvar::new(),
        }
    }

    /// Insert a DATA packet. Idempotent on duplicate `seq_n`: the first copy
    /// wins and the new one is dropped. Wakes any blocked `take_blocking`.
    pub fn offer(&self, packet: Packet) {
        let mut inner = self.inner.lock().unwrap();
        inner.packets.entry(packet.seq_n).or_insert(packet);
        self.cond.notify_all();
    }

    /// Non-blocking "peek-min and pop if it equals `expected`".
    pub fn take_if_ready(&self, expected: u32) -> Option<Packet> {
        let mut inner = self.inner.lock().unwrap();
        Self::take_ready_locked(&mut inner, expected)
    }

    /// Block until a packet with `seq_n == expected` is available or the
    /// buffer is marked closed, whichever comes first.
    pub fn take_blocking(&self, expected: u32, poll_interval: Duration) -> Option<Packet> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(pkt) = Self::take_ready_locked(&mut inner, expected) {
                return Some(pkt);
            }
            if inner.closed {
                return None;
            }
            let (guard, _timeout) = self.cond.wait_timeout(inner, poll_interval).unwrap();
            inner = guard;
        }
    }

    /// Mark the buffer closed, waking any blocked reader so it can observe
    /// end-of-stream.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        self.cond.notify_all();
    }

    /// Number of buffered (necessarily out-of-order, once drained) packets.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_ready_locked(inner: &mut Inner, expected: u32) -> Option<Packet> {
        // Defense in depth: a stale duplicate below `expected` must never sit
        // at the head and mask the packet we're actually waiting for.
        while let Some(&min_seq) = inner.packets.keys().next() {
            if min_seq < expected {
                inner.packets.remove(&min_seq);
                continue;
            }
            break;
        }
        match inner.packets.keys().next() {
            Some(&min_seq) if min_seq == expected => inner.packets.remove(&min_seq),
            _ => None,
        }
    }
}

impl Default for ReassemblyBuffer {
    fn default() -> Self {
        Self::new()
    }
}
