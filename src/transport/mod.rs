//! Transport adapter boundary.
//!
//! The crate never talks to serial ports or USB stacks directly; the host
//! platform supplies a [`Transport`] for moving raw bytes and a
//! [`DeviceEnumerator`] for listing candidate devices during detection. The
//! one concrete transport shipped here is [`BlockFileTransport`], for devices
//! that present their history as a block file rather than a live port.

use async_trait::async_trait;

use crate::error::Result;

pub mod block;

pub use block::BlockFileTransport;

/// How to pick and configure the physical port for a device family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSelector {
    /// Path prefix candidate ports must match (e.g. `/dev/cu.usb`).
    pub port_prefix: String,
    /// Serial bitrate.
    pub bitrate: u32,
}

impl Default for PortSelector {
    fn default() -> Self {
        Self { port_prefix: "/dev/cu.usb".to_string(), bitrate: 9600 }
    }
}

/// Raw byte transport to one physical device.
///
/// Reads are chunk-oriented: the platform delivers whatever arrived, in
/// arrival order, and `Ok(None)` means the connection closed normally.
/// Implementations own their timing; callers `.await` and never block.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Open the physical connection described by `selector`.
    async fn open(&mut self, selector: &PortSelector) -> Result<()>;

    /// Next chunk of inbound bytes, or `None` once the connection is closed.
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>>;

    /// Write bytes to the device, returning how many were actually sent.
    /// Short writes are legal at this level; the channel pump logs them.
    async fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Close the connection. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Filter for candidate enumeration during detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFilter {
    pub port_prefix: Option<String>,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
}

impl CandidateFilter {
    /// Filter on a serial port path prefix.
    pub fn port_prefix(prefix: impl Into<String>) -> Self {
        Self { port_prefix: Some(prefix.into()), ..Self::default() }
    }

    /// Filter on a USB vendor/product pair.
    pub fn usb(vendor_id: u16, product_id: u16) -> Self {
        Self { vendor_id: Some(vendor_id), product_id: Some(product_id), ..Self::default() }
    }
}

/// One device the platform found matching a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Platform identifier (port path, USB address, volume id).
    pub id: String,
    /// Human-readable label, when the platform has one.
    pub label: Option<String>,
}

/// Platform device enumeration, used by drivers during `detect`.
#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    async fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<Candidate>>;
}
