//! Driver lifecycle contract.
//!
//! Every device family ships one [`Driver`]. The contract is eleven
//! operations: `enable`/`disable` (synchronous, idempotent), `detect`, and
//! the eight [`PipelineStage`] operations the manager runs in order for a
//! detected device. The trait makes the contract a compile-time fact;
//! [`Driver::capabilities`] remains as a startup-audit hook for drivers
//! loaded dynamically, where an implementation may stub out operations it
//! cannot honor.

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::progress::StageProgress;

/// The eight ordered lifecycle stages of one device interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Setup,
    Connect,
    GetConfigInfo,
    FetchData,
    ProcessData,
    UploadData,
    Disconnect,
    Cleanup,
}

impl PipelineStage {
    /// All stages, pipeline order.
    pub const ALL: [PipelineStage; 8] = [
        PipelineStage::Setup,
        PipelineStage::Connect,
        PipelineStage::GetConfigInfo,
        PipelineStage::FetchData,
        PipelineStage::ProcessData,
        PipelineStage::UploadData,
        PipelineStage::Disconnect,
        PipelineStage::Cleanup,
    ];

    /// Position of this stage in the pipeline (0..8).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            PipelineStage::Setup => "setup",
            PipelineStage::Connect => "connect",
            PipelineStage::GetConfigInfo => "get_config_info",
            PipelineStage::FetchData => "fetch_data",
            PipelineStage::ProcessData => "process_data",
            PipelineStage::UploadData => "upload_data",
            PipelineStage::Disconnect => "disconnect",
            PipelineStage::Cleanup => "cleanup",
        }
    }

    /// The capability backing this stage.
    pub fn capability(self) -> Capability {
        match self {
            PipelineStage::Setup => Capability::Setup,
            PipelineStage::Connect => Capability::Connect,
            PipelineStage::GetConfigInfo => Capability::GetConfigInfo,
            PipelineStage::FetchData => Capability::FetchData,
            PipelineStage::ProcessData => Capability::ProcessData,
            PipelineStage::UploadData => Capability::UploadData,
            PipelineStage::Disconnect => Capability::Disconnect,
            PipelineStage::Cleanup => Capability::Cleanup,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the eleven operations every driver must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Enable,
    Disable,
    Detect,
    Setup,
    Connect,
    GetConfigInfo,
    FetchData,
    ProcessData,
    UploadData,
    Disconnect,
    Cleanup,
}

impl Capability {
    /// The full eleven-operation capability set.
    pub const ALL: [Capability; 11] = [
        Capability::Enable,
        Capability::Disable,
        Capability::Detect,
        Capability::Setup,
        Capability::Connect,
        Capability::GetConfigInfo,
        Capability::FetchData,
        Capability::ProcessData,
        Capability::UploadData,
        Capability::Disconnect,
        Capability::Cleanup,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Capability::Enable => "enable",
            Capability::Disable => "disable",
            Capability::Detect => "detect",
            Capability::Setup => "setup",
            Capability::Connect => "connect",
            Capability::GetConfigInfo => "get_config_info",
            Capability::FetchData => "fetch_data",
            Capability::ProcessData => "process_data",
            Capability::UploadData => "upload_data",
            Capability::Disconnect => "disconnect",
            Capability::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier of one discovered physical device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        DeviceId::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        DeviceId(id)
    }
}

/// Stage-dependent success payload.
///
/// Drivers accumulate their real artifacts (fetched pages, decoded records,
/// upload receipts) on themselves between stages; the outcome is the small
/// result the orchestration layer reports and tests assert on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: PipelineStage,
    pub summary: Option<String>,
}

impl StageOutcome {
    pub fn new(stage: PipelineStage) -> Self {
        Self { stage, summary: None }
    }

    pub fn with_summary(stage: PipelineStage, summary: impl Into<String>) -> Self {
        Self { stage, summary: Some(summary.into()) }
    }
}

/// The uniform lifecycle contract every device driver implements.
///
/// `enable`/`disable` are synchronous and idempotent; a disabled driver's
/// `detect` must report nothing found without touching any transport. Each
/// stage operation receives a [`StageProgress`] handle already bound to that
/// stage's window of the overall progress range, may perform asynchronous
/// I/O, and resolves exactly once with its outcome or an error.
#[async_trait]
pub trait Driver: Send {
    fn enable(&mut self);
    fn disable(&mut self);
    fn is_enabled(&self) -> bool;

    /// Operations this driver actually implements. Defaults to the full set;
    /// dynamically loaded drivers may report less, which the manager logs at
    /// startup. A stage whose capability is missing fails loudly if run.
    fn capabilities(&self) -> &[Capability] {
        &Capability::ALL
    }

    /// Probe for physically present devices. An empty list means none found.
    async fn detect(&mut self) -> Result<Vec<DeviceId>>;

    async fn setup(&mut self, progress: StageProgress) -> Result<StageOutcome>;
    async fn connect(&mut self, progress: StageProgress) -> Result<StageOutcome>;
    async fn get_config_info(&mut self, progress: StageProgress) -> Result<StageOutcome>;
    async fn fetch_data(&mut self, progress: StageProgress) -> Result<StageOutcome>;
    async fn process_data(&mut self, progress: StageProgress) -> Result<StageOutcome>;
    async fn upload_data(&mut self, progress: StageProgress) -> Result<StageOutcome>;
    async fn disconnect(&mut self, progress: StageProgress) -> Result<StageOutcome>;
    async fn cleanup(&mut self, progress: StageProgress) -> Result<StageOutcome>;
}
