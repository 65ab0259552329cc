//! Async pipeline for reading diabetes devices and uploading their records.
//!
//! Medlink is the device-facing core of an uploader: it buffers raw bytes
//! from a serial or block-file transport, frames them into packets with a
//! per-protocol [`PacketFramer`], and walks each device driver through a
//! fixed eight-stage lifecycle (setup through cleanup) with weighted progress
//! reporting along the way. A [`SearchController`] ties it together: detect
//! what is plugged in, process every hit in series, optionally on a repeating
//! schedule.
//!
//! # Features
//!
//! - **Pluggable framing**: stateful packet framers per device protocol
//! - **Uniform driver contract**: eleven operations, checked at compile time
//! - **Weighted progress**: each stage owns a window of the 0–100 range
//! - **Background search**: repeat on an interval, overlap-safe, cancellable
//!
//! ## Example (registry + repeating search)
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use medlink::{
//!     DriverConfig, DriverRegistry, LogSink, ProgressMap, SearchController,
//! };
//! # use medlink::{Driver, StageProgress, StageOutcome, DeviceId, Result};
//! # struct MeterDriver;
//! # impl MeterDriver { fn new(_cfg: DriverConfig) -> Self { MeterDriver } }
//! # #[async_trait::async_trait]
//! # impl Driver for MeterDriver {
//! #     fn enable(&mut self) {}
//! #     fn disable(&mut self) {}
//! #     fn is_enabled(&self) -> bool { true }
//! #     async fn detect(&mut self) -> Result<Vec<DeviceId>> { Ok(vec![]) }
//! #     async fn setup(&mut self, _p: StageProgress) -> Result<StageOutcome> { unimplemented!() }
//! #     async fn connect(&mut self, _p: StageProgress) -> Result<StageOutcome> { unimplemented!() }
//! #     async fn get_config_info(&mut self, _p: StageProgress) -> Result<StageOutcome> { unimplemented!() }
//! #     async fn fetch_data(&mut self, _p: StageProgress) -> Result<StageOutcome> { unimplemented!() }
//! #     async fn process_data(&mut self, _p: StageProgress) -> Result<StageOutcome> { unimplemented!() }
//! #     async fn upload_data(&mut self, _p: StageProgress) -> Result<StageOutcome> { unimplemented!() }
//! #     async fn disconnect(&mut self, _p: StageProgress) -> Result<StageOutcome> { unimplemented!() }
//! #     async fn cleanup(&mut self, _p: StageProgress) -> Result<StageOutcome> { unimplemented!() }
//! # }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = DriverRegistry::builder()
//!         .enabled_driver("MyMeter", DriverConfig::default(), MeterDriver::new)
//!         .build();
//!
//!     let controller = SearchController::new(
//!         Arc::new(registry),
//!         Arc::new(LogSink),
//!         ProgressMap::default(),
//!     );
//!     let mut schedule = controller.repeat(Duration::from_secs(5));
//!
//!     while let Some(outcome) = schedule.next().await {
//!         let outcome = outcome?;
//!         println!("processed {} device driver(s)", outcome.runs.len());
//!     }
//!     Ok(())
//! }
//! ```

// Byte handling and framing
pub mod buffer;
pub mod channel;
pub mod framing;
pub mod transport;

// Driver lifecycle and orchestration
pub mod driver;
pub mod manager;
pub mod progress;
pub mod registry;
pub mod search;

// Configuration and the remote boundary
pub mod config;
pub mod session;

mod error;
#[cfg(test)]
pub mod test_utils;

// Core exports
pub use buffer::{Packet, PacketQueue, StreamBuffer};
pub use channel::{ChannelPump, DeviceChannel};
pub use error::{DeviceError, Result};
pub use framing::{DelimitedFramer, FrameOutcome, PacketFramer};

// Driver and orchestration exports
pub use driver::{Capability, DeviceId, Driver, PipelineStage, StageOutcome};
pub use manager::{DriverManager, RunResult, HIDE_DELAY};
pub use progress::{
    LogSink, NullSink, ProgressMap, ProgressSink, ProgressUpdate, StageProgress, StageWindow,
    WatchSink,
};
pub use registry::{DriverConfig, DriverRegistry, DriverRegistryBuilder};
pub use search::{SearchController, SearchOutcome, SearchSchedule};

// Configuration and remote-boundary exports
pub use config::{DriverEntry, LinkConfig};
pub use session::{Environment, Record, Session, UploadReceipt, Uploader};
pub use transport::{
    BlockFileTransport, Candidate, CandidateFilter, DeviceEnumerator, PortSelector, Transport,
};
