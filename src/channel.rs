//! Device channel: byte buffer, framing, and packet queue for one device.
//!
//! A [`DeviceChannel`] is the meeting point between a transport and a driver.
//! The transport side appends raw chunks; every append re-runs the installed
//! packet framer until it reports no complete frame, so several frames
//! arriving in one chunk are all extracted before control returns. The driver
//! side consumes decoded packets in FIFO order, or performs bounded raw reads
//! for protocols that are not packet-shaped.
//!
//! [`ChannelPump`] is the task that feeds a channel from a [`Transport`] and
//! services the driver's write requests, following the reader-task layout
//! used elsewhere in the crate's lifecycle handling.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::buffer::{Packet, PacketQueue, StreamBuffer};
use crate::error::{DeviceError, Result};
use crate::framing::{FrameOutcome, PacketFramer};
use crate::transport::Transport;

#[derive(Default)]
struct ChannelState {
    buffer: StreamBuffer,
    framer: Option<Box<dyn PacketFramer>>,
    packets: PacketQueue,
}

impl ChannelState {
    /// Run the installed framer until it stops matching. Called after every
    /// append so multi-frame chunks are fully drained.
    fn extract_frames(&mut self) {
        let Some(framer) = self.framer.as_mut() else {
            return;
        };
        loop {
            let view = self.buffer.contiguous();
            match framer.frame(view) {
                FrameOutcome::NoFrame => break,
                FrameOutcome::Frame { packet, consumed } => {
                    if consumed == 0 || consumed > self.buffer.len() {
                        // A framer that consumes nothing (or more than exists)
                        // would spin this loop forever; treat it as a defect.
                        error!(
                            consumed,
                            buffered = self.buffer.len(),
                            "framer reported impossible consumption, stopping extraction"
                        );
                        break;
                    }
                    // In bounds per the check above.
                    let _ = self.buffer.discard(consumed);
                    self.packets.enqueue(packet);
                }
            }
        }
    }
}

/// Shared handle to one device's buffer, framer slot, and packet queue.
///
/// Clones refer to the same underlying channel; a channel belongs to exactly
/// one driver and is never shared across drivers or concurrent pipeline runs.
#[derive(Clone, Default)]
pub struct DeviceChannel {
    inner: Arc<Mutex<ChannelState>>,
}

impl DeviceChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        // Lock is only held across synchronous buffer work; a poisoned lock
        // still holds consistent byte data, so recover rather than panic.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append inbound bytes, then extract every complete frame the installed
    /// framer can find.
    pub fn append(&self, chunk: &[u8]) {
        let mut st = self.state();
        st.buffer.append(chunk);
        st.extract_frames();
    }

    /// Install the packet framer. Takes effect on the next append; any
    /// partial-match state the previous framer held is gone.
    pub fn set_packet_handler<F: PacketFramer + 'static>(&self, framer: F) {
        self.state().framer = Some(Box::new(framer));
    }

    /// Remove the packet framer; subsequent appends only accumulate bytes.
    pub fn clear_packet_handler(&self) {
        self.state().framer = None;
    }

    /// Whether a decoded packet is waiting.
    pub fn has_available_packet(&self) -> bool {
        self.state().packets.has_available()
    }

    /// Oldest decoded packet without consuming it.
    pub fn peek_packet(&self) -> Option<Packet> {
        self.state().packets.peek().cloned()
    }

    /// Consume and return the oldest decoded packet.
    pub fn next_packet(&self) -> Option<Packet> {
        self.state().packets.dequeue()
    }

    /// Drop every queued packet.
    pub fn flush_packets(&self) {
        self.state().packets.flush();
    }

    /// Number of raw bytes currently buffered (not yet framed or read).
    pub fn buffered_len(&self) -> usize {
        self.state().buffer.len()
    }

    /// Copy of the raw buffer contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.state().buffer.snapshot()
    }

    /// Remove the first `n` raw bytes; rejected if `n` exceeds the buffer.
    pub fn discard(&self, n: usize) -> Result<()> {
        self.state().buffer.discard(n)
    }

    /// Bounded raw read, bypassing the framer.
    ///
    /// Returns `count` bytes immediately if they are buffered. With a zero
    /// timeout, returns whatever is buffered right now. Otherwise waits once
    /// for `timeout` and then returns what arrived, full count or not. The
    /// single wait is deliberate; this is not a deadline loop.
    pub async fn read_bytes(&self, count: usize, timeout: Duration) -> Vec<u8> {
        {
            let mut st = self.state();
            if st.buffer.len() >= count {
                return st.buffer.drain_front(count);
            }
            if timeout.is_zero() {
                return st.buffer.drain_all();
            }
        }
        sleep(timeout).await;
        let mut st = self.state();
        if st.buffer.len() >= count {
            st.buffer.drain_front(count)
        } else {
            st.buffer.drain_all()
        }
    }
}

struct WriteRequest {
    bytes: Vec<u8>,
    done: oneshot::Sender<Result<usize>>,
}

/// Handle to the task pumping a transport into a [`DeviceChannel`].
///
/// Dropping the pump cancels the task; the transport is closed on the way
/// out.
pub struct ChannelPump {
    cancel: CancellationToken,
    write_tx: mpsc::UnboundedSender<WriteRequest>,
}

impl ChannelPump {
    /// Spawn the pump task. The transport must already be open; the task owns
    /// it from here on, reading chunks into the channel and servicing write
    /// requests until cancellation or end-of-input.
    pub fn spawn<T: Transport>(mut transport: T, channel: DeviceChannel) -> ChannelPump {
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();
        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<WriteRequest>();
        // The task holds a sender clone so the recv arm never sees a closed
        // channel while reads are still flowing.
        let _keepalive = write_tx.clone();

        tokio::spawn(async move {
            let _keepalive = _keepalive;
            loop {
                tokio::select! {
                    _ = cancel_task.cancelled() => {
                        debug!("channel pump cancelled");
                        break;
                    }
                    Some(req) = write_rx.recv() => {
                        let result = transport.write(&req.bytes).await;
                        if let Ok(sent) = &result {
                            if *sent != req.bytes.len() {
                                warn!(sent, expected = req.bytes.len(), "short write to device");
                            }
                        }
                        let _ = req.done.send(result);
                    }
                    chunk = transport.read_chunk() => {
                        match chunk {
                            Ok(Some(bytes)) => channel.append(&bytes),
                            Ok(None) => {
                                debug!("transport reported end of input, pump ending");
                                break;
                            }
                            Err(e) => {
                                warn!(error = %e, "transport read failed, pump ending");
                                break;
                            }
                        }
                    }
                }
            }
            if let Err(e) = transport.close().await {
                warn!(error = %e, "transport close failed");
            }
        });

        ChannelPump { cancel, write_tx }
    }

    /// Write bytes to the device through the pump task. Resolves once the
    /// transport reports completion, with the count actually sent.
    pub async fn write(&self, bytes: Vec<u8>) -> Result<usize> {
        let (done_tx, done_rx) = oneshot::channel();
        self.write_tx
            .send(WriteRequest { bytes, done: done_tx })
            .map_err(|_| DeviceError::transport("channel pump is not running"))?;
        done_rx.await.map_err(|_| DeviceError::transport("write abandoned by channel pump"))?
    }

    /// Stop the pump. In-flight reads are abandoned; the transport is closed.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ChannelPump {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
