//! Block-file transport.
//!
//! Some pumps don't expose a live serial port; they mount as storage and the
//! interesting bytes live in a block file (an `.ibf` dump, for instance).
//! This transport reads the whole file on open and yields it as a single
//! chunk, after which the stream reports end-of-input. Framing and protocol
//! decoding then proceed exactly as they would for a live port.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{DeviceError, Result};
use crate::transport::{PortSelector, Transport};

/// Transport over a device dump file.
pub struct BlockFileTransport {
    path: PathBuf,
    pending: Option<Vec<u8>>,
    open: bool,
}

impl BlockFileTransport {
    /// Create a transport for the given block file. Nothing is read until
    /// [`Transport::open`] is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), pending: None, open: false }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl Transport for BlockFileTransport {
    async fn open(&mut self, _selector: &PortSelector) -> Result<()> {
        let data = std::fs::read(&self.path).map_err(|e| {
            DeviceError::transport_io(format!("reading block file {}", self.path.display()), e)
        })?;
        info!(path = %self.path.display(), bytes = data.len(), "opened block file");
        self.pending = Some(data);
        self.open = true;
        Ok(())
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.open {
            return Err(DeviceError::transport("block file transport is not open"));
        }
        // One chunk containing the whole file, then end-of-input.
        Ok(self.pending.take())
    }

    async fn write(&mut self, _bytes: &[u8]) -> Result<usize> {
        Err(DeviceError::transport("block file transport is read-only"))
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            debug!(path = %self.path.display(), "closing block file");
        }
        self.open = false;
        self.pending = None;
        Ok(())
    }
}
