//! Byte stream buffer and packet queue.
//!
//! [`StreamBuffer`] owns the raw inbound bytes for one device: the transport
//! appends at the tail, framers consume from the head. It is backed by a
//! `VecDeque` so a discard is a cursor move, not a reallocation of the whole
//! buffer. [`PacketQueue`] holds the decoded [`Packet`]s in arrival order
//! until the owning driver consumes them.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{DeviceError, Result};

/// Growable byte buffer, append-only at the tail, truncatable from the head.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    bytes: VecDeque<u8>,
}

impl StreamBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of raw bytes at the tail.
    pub fn append(&mut self, chunk: &[u8]) {
        self.bytes.extend(chunk.iter().copied());
    }

    /// Byte at `index`, or `None` past the end.
    pub fn byte_at(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Remove the first `n` bytes.
    ///
    /// Rejects (rather than silently truncating) a discard larger than the
    /// current length; the buffer is left untouched in that case.
    pub fn discard(&mut self, n: usize) -> Result<()> {
        if n > self.bytes.len() {
            return Err(DeviceError::buffer_underflow("discard", n, self.bytes.len()));
        }
        self.bytes.drain(..n);
        Ok(())
    }

    /// Immutable copy of the current contents.
    ///
    /// Framers inspect a snapshot (or the contiguous view) without committing
    /// consumption; consumption only happens through [`StreamBuffer::discard`].
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.iter().copied().collect()
    }

    /// Contiguous view of the buffer for framer inspection.
    pub(crate) fn contiguous(&mut self) -> &[u8] {
        self.bytes.make_contiguous()
    }

    /// Remove and return up to `n` bytes from the head.
    pub(crate) fn drain_front(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.bytes.len());
        self.bytes.drain(..n).collect()
    }

    /// Remove and return everything currently buffered.
    pub(crate) fn drain_all(&mut self) -> Vec<u8> {
        self.bytes.drain(..).collect()
    }
}

/// An opaque decoded protocol unit produced by a packet framer.
///
/// The payload is immutable and cheap to clone; interpretation of the bytes
/// is the owning driver's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Arc<[u8]>,
}

impl Packet {
    /// Wrap decoded bytes in a packet.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// The decoded payload.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for Packet {
    fn from(bytes: Vec<u8>) -> Self {
        Packet::new(bytes)
    }
}

impl From<&[u8]> for Packet {
    fn from(bytes: &[u8]) -> Self {
        Packet::new(bytes.to_vec())
    }
}

/// FIFO queue of decoded packets, owned by one driver.
#[derive(Debug, Default)]
pub struct PacketQueue {
    packets: VecDeque<Packet>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a packet at the tail. Only the owning channel's framing step
    /// should call this.
    pub fn enqueue(&mut self, packet: Packet) {
        self.packets.push_back(packet);
    }

    /// Remove and return the oldest packet, if any.
    pub fn dequeue(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }

    /// Look at the oldest packet without removing it.
    pub fn peek(&self) -> Option<&Packet> {
        self.packets.front()
    }

    pub fn has_available(&self) -> bool {
        !self.packets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Drop every queued packet.
    pub fn flush(&mut self) {
        self.packets.clear();
    }
}
