//! Packet framing contract.
//!
//! A framer turns the raw byte soup one device emits into self-delimited
//! packets. Each driver supplies its own framer for its protocol; the channel
//! invokes it after every append until it reports [`FrameOutcome::NoFrame`].
//!
//! The contract:
//! - a framer only inspects the buffer view; the caller discards exactly
//!   `consumed` bytes and enqueues the packet on a positive result,
//! - called again on an unchanged buffer, a framer must keep returning
//!   `NoFrame` rather than re-emitting the previous packet,
//! - framers may be stateful (partial-match bookkeeping is theirs to keep),
//!   but no such state survives a handler swap on the channel.

use crate::buffer::Packet;

/// Result of one framing attempt over the current buffer contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No complete frame at the head of the buffer yet.
    NoFrame,
    /// A complete frame was matched: `packet` is the decoded unit and
    /// `consumed` is how many bytes the caller must remove from the buffer.
    Frame { packet: Packet, consumed: usize },
}

impl FrameOutcome {
    /// Convenience constructor for a matched frame.
    pub fn frame(packet: impl Into<Packet>, consumed: usize) -> Self {
        FrameOutcome::Frame { packet: packet.into(), consumed }
    }
}

/// Device-specific packet detector.
///
/// Implemented either as a type or as a plain `FnMut(&[u8]) -> FrameOutcome`
/// closure via the blanket impl.
pub trait PacketFramer: Send {
    fn frame(&mut self, buf: &[u8]) -> FrameOutcome;
}

impl<F> PacketFramer for F
where
    F: FnMut(&[u8]) -> FrameOutcome + Send,
{
    fn frame(&mut self, buf: &[u8]) -> FrameOutcome {
        self(buf)
    }
}

/// Framer for protocols that terminate each frame with a single byte.
///
/// The packet excludes the terminator; the terminator byte is consumed.
#[derive(Debug, Clone, Copy)]
pub struct DelimitedFramer {
    terminator: u8,
}

impl DelimitedFramer {
    pub fn new(terminator: u8) -> Self {
        Self { terminator }
    }
}

impl PacketFramer for DelimitedFramer {
    fn frame(&mut self, buf: &[u8]) -> FrameOutcome {
        match buf.iter().position(|&b| b == self.terminator) {
            Some(end) => FrameOutcome::frame(&buf[..end], end + 1),
            None => FrameOutcome::NoFrame,
        }
    }
}
