//! Shared doubles for unit tests: a scripted driver, a scripted transport,
//! and a recording progress sink.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::driver::{Capability, DeviceId, Driver, PipelineStage, StageOutcome};
use crate::error::{DeviceError, Result};
use crate::progress::{ProgressSink, StageProgress};
use crate::transport::{PortSelector, Transport};

/// Install the fmt subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Transport that replays a fixed list of inbound chunks and records writes.
/// Once the chunks run out, reads park forever, like an idle serial port.
pub struct MockTransport {
    chunks: Vec<Vec<u8>>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockTransport {
    pub fn with_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self { chunks, written: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Handle to the bytes written so far; stays valid after the transport
    /// moves into a pump task.
    pub fn written(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.written)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&mut self, _selector: &PortSelector) -> Result<()> {
        Ok(())
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.chunks.is_empty() {
            futures::future::pending::<()>().await;
            unreachable!("pending future resolved");
        }
        Ok(Some(self.chunks.remove(0)))
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.written.lock().unwrap().push(bytes.to_vec());
        Ok(bytes.len())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Progress sink that records every report and counts hides.
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<(String, u8)>>,
    hides: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(String, u8)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn hide_count(&self) -> usize {
        self.hides.load(Ordering::SeqCst)
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, label: &str, percent: u8) {
        self.reports.lock().unwrap().push((label.to_string(), percent));
    }

    fn hide(&self) {
        self.hides.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptState {
    detect_ids: Vec<String>,
    detect_error: Option<String>,
    fail_stage: Option<(PipelineStage, String)>,
    capabilities: Vec<Capability>,
    midpoints: bool,
    delay: Duration,
    detect_calls: usize,
    transport_touches: usize,
    stage_calls: [usize; 8],
    stage_log: Vec<String>,
}

/// Shared script and call recorder behind one or more [`ScriptedDriver`]
/// instances. Cloning shares the same counters, so tests keep a handle while
/// the registry factory builds fresh driver instances against it.
#[derive(Clone)]
pub struct SharedScript {
    state: Arc<Mutex<ScriptState>>,
}

impl SharedScript {
    /// Script whose detection reports the given device ids.
    pub fn detecting(ids: &[&str]) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                detect_ids: ids.iter().map(|s| s.to_string()).collect(),
                detect_error: None,
                fail_stage: None,
                capabilities: Capability::ALL.to_vec(),
                midpoints: false,
                delay: Duration::ZERO,
                detect_calls: 0,
                transport_touches: 0,
                stage_calls: [0; 8],
                stage_log: Vec::new(),
            })),
        }
    }

    /// Script whose detection fails with the given message.
    pub fn failing_detect(message: &str) -> Self {
        let script = Self::detecting(&[]);
        script.state.lock().unwrap().detect_error = Some(message.to_string());
        script
    }

    /// Make the named stage fail.
    pub fn fail_at(&self, stage: PipelineStage, message: &str) {
        self.state.lock().unwrap().fail_stage = Some((stage, message.to_string()));
    }

    /// Remove one capability from drivers built after this call.
    pub fn drop_capability(&self, capability: Capability) {
        self.state.lock().unwrap().capabilities.retain(|c| *c != capability);
    }

    /// Make every stage self-report 50% progress.
    pub fn report_midpoints(&self) {
        self.state.lock().unwrap().midpoints = true;
    }

    /// Make every stage take this long.
    pub fn stage_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    pub fn detect_calls(&self) -> usize {
        self.state.lock().unwrap().detect_calls
    }

    /// Times an enabled detection actually probed for hardware.
    pub fn transport_touches(&self) -> usize {
        self.state.lock().unwrap().transport_touches
    }

    pub fn stage_calls(&self, stage: PipelineStage) -> usize {
        self.state.lock().unwrap().stage_calls[stage.index()]
    }

    /// Stage names in invocation order, across every driver instance.
    pub fn stage_log(&self) -> Vec<String> {
        self.state.lock().unwrap().stage_log.clone()
    }
}

/// Driver whose behavior is dictated by a [`SharedScript`].
pub struct ScriptedDriver {
    script: SharedScript,
    capabilities: Vec<Capability>,
    enabled: bool,
}

impl ScriptedDriver {
    pub fn from_script(script: SharedScript) -> Self {
        let capabilities = script.state.lock().unwrap().capabilities.clone();
        Self { script, capabilities, enabled: false }
    }

    /// Standalone driver that detects the given ids.
    pub fn found(ids: &[&str]) -> Self {
        Self::from_script(SharedScript::detecting(ids))
    }

    async fn run_stage(&mut self, stage: PipelineStage, progress: StageProgress) -> Result<StageOutcome> {
        let (delay, midpoints, failure) = {
            let mut st = self.script.state.lock().unwrap();
            st.stage_calls[stage.index()] += 1;
            st.stage_log.push(stage.name().to_string());
            let failure = match &st.fail_stage {
                Some((s, msg)) if *s == stage => Some(msg.clone()),
                _ => None,
            };
            (st.delay, st.midpoints, failure)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if midpoints {
            progress.update(50);
        }
        match failure {
            Some(msg) => Err(DeviceError::transport(msg)),
            None => Ok(StageOutcome::new(stage)),
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    async fn detect(&mut self) -> Result<Vec<DeviceId>> {
        let mut st = self.script.state.lock().unwrap();
        st.detect_calls += 1;
        if !self.enabled {
            return Ok(Vec::new());
        }
        st.transport_touches += 1;
        if let Some(msg) = &st.detect_error {
            return Err(DeviceError::transport(msg.clone()));
        }
        Ok(st.detect_ids.iter().map(DeviceId::new).collect())
    }

    async fn setup(&mut self, progress: StageProgress) -> Result<StageOutcome> {
        self.run_stage(PipelineStage::Setup, progress).await
    }

    async fn connect(&mut self, progress: StageProgress) -> Result<StageOutcome> {
        self.run_stage(PipelineStage::Connect, progress).await
    }

    async fn get_config_info(&mut self, progress: StageProgress) -> Result<StageOutcome> {
        self.run_stage(PipelineStage::GetConfigInfo, progress).await
    }

    async fn fetch_data(&mut self, progress: StageProgress) -> Result<StageOutcome> {
        self.run_stage(PipelineStage::FetchData, progress).await
    }

    async fn process_data(&mut self, progress: StageProgress) -> Result<StageOutcome> {
        self.run_stage(PipelineStage::ProcessData, progress).await
    }

    async fn upload_data(&mut self, progress: StageProgress) -> Result<StageOutcome> {
        self.run_stage(PipelineStage::UploadData, progress).await
    }

    async fn disconnect(&mut self, progress: StageProgress) -> Result<StageOutcome> {
        self.run_stage(PipelineStage::Disconnect, progress).await
    }

    async fn cleanup(&mut self, progress: StageProgress) -> Result<StageOutcome> {
        self.run_stage(PipelineStage::Cleanup, progress).await
    }
}
