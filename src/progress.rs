//! Progress reporting across the eight-stage pipeline.
//!
//! Each stage owns a fixed window of the overall 0–100 range; a stage's
//! internal 0–100 self-report is mapped linearly into its window so overall
//! progress is monotonic across a run. The presentation side is behind
//! [`ProgressSink`] — the core never assumes a visual surface exists.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::driver::PipelineStage;
use crate::error::{DeviceError, Result};

/// Presentation-layer callback for progress display.
pub trait ProgressSink: Send + Sync {
    /// Show `label` at `percent` of the overall range.
    fn report(&self, label: &str, percent: u8);
    /// Take the progress surface down.
    fn hide(&self);
}

/// One stage's share of the overall progress range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageWindow {
    pub label: String,
    pub min: u8,
    pub max: u8,
}

impl StageWindow {
    pub fn new(label: impl Into<String>, min: u8, max: u8) -> Self {
        Self { label: label.into(), min, max }
    }
}

/// The eight stage windows, validated contiguous and covering 0..=100.
#[derive(Debug, Clone)]
pub struct ProgressMap {
    windows: [StageWindow; 8],
}

impl ProgressMap {
    /// Build a map from explicit windows. Windows are configuration fixed at
    /// manager construction: they must start at 0, end at 100, and each
    /// window must begin exactly where the previous one ends.
    pub fn new(windows: [StageWindow; 8]) -> Result<Self> {
        if windows[0].min != 0 {
            return Err(DeviceError::InvalidWindows {
                reason: format!("first window starts at {}, not 0", windows[0].min),
            });
        }
        if windows[7].max != 100 {
            return Err(DeviceError::InvalidWindows {
                reason: format!("last window ends at {}, not 100", windows[7].max),
            });
        }
        for (i, w) in windows.iter().enumerate() {
            if w.min > w.max {
                return Err(DeviceError::InvalidWindows {
                    reason: format!("window '{}' has min {} > max {}", w.label, w.min, w.max),
                });
            }
            if i > 0 && windows[i - 1].max != w.min {
                return Err(DeviceError::InvalidWindows {
                    reason: format!(
                        "window '{}' starts at {} but the previous one ends at {}",
                        w.label,
                        w.min,
                        windows[i - 1].max
                    ),
                });
            }
        }
        Ok(Self { windows })
    }

    /// Window for one stage.
    pub fn window(&self, stage: PipelineStage) -> &StageWindow {
        &self.windows[stage.index()]
    }
}

impl Default for ProgressMap {
    /// The stock windows: upload-heavy runs spend most of their time fetching
    /// and uploading, and the windows weight accordingly.
    fn default() -> Self {
        Self {
            windows: [
                StageWindow::new("setting up", 0, 5),
                StageWindow::new("connecting", 5, 10),
                StageWindow::new("getting configuration data", 10, 20),
                StageWindow::new("fetching data", 20, 50),
                StageWindow::new("processing data", 50, 60),
                StageWindow::new("uploading data", 60, 90),
                StageWindow::new("disconnecting", 90, 95),
                StageWindow::new("cleaning up", 95, 100),
            ],
        }
    }
}

/// Maps per-stage progress into the overall range and forwards it to a sink.
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    map: ProgressMap,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>, map: ProgressMap) -> Self {
        Self { sink, map }
    }

    /// A progress handle pre-bound to one stage's window. Handed to the
    /// driver so its 0–100 self-reports land in the right slice.
    pub fn stage(&self, stage: PipelineStage) -> StageProgress {
        let window = self.map.window(stage).clone();
        StageProgress { sink: Arc::clone(&self.sink), stage, window }
    }

    /// Hide the progress surface immediately.
    pub fn hide_now(&self) {
        self.sink.hide();
    }

    /// Hide the progress surface after `delay`, success or failure alike, so
    /// a failed run never leaves a stale indicator visible.
    pub fn hide_after(&self, delay: Duration) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sink.hide();
        });
    }
}

/// Stage-bound progress handle passed into each driver stage operation.
#[derive(Clone)]
pub struct StageProgress {
    sink: Arc<dyn ProgressSink>,
    stage: PipelineStage,
    window: StageWindow,
}

impl StageProgress {
    /// Report intra-stage progress (0–100, clamped). The value is floored
    /// into this stage's window of the overall range.
    pub fn update(&self, percent: u8) {
        let pct = u32::from(percent.min(100));
        let span = u32::from(self.window.max - self.window.min);
        let overall = u32::from(self.window.min) + span * pct / 100;
        self.sink.report(&self.window.label, overall as u8);
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }
}

/// Sink that drops everything; for headless runs and tests.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _label: &str, _percent: u8) {}
    fn hide(&self) {}
}

/// Sink that logs progress through `tracing`.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn report(&self, label: &str, percent: u8) {
        debug!(label, percent, "progress");
    }

    fn hide(&self) {
        debug!("progress hidden");
    }
}

/// One visible progress state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub label: String,
    pub percent: u8,
}

/// Sink that publishes progress over a watch channel.
///
/// `None` means the surface is hidden. Presentation code subscribes with
/// [`WatchSink::updates`] and renders whatever arrives.
pub struct WatchSink {
    tx: watch::Sender<Option<ProgressUpdate>>,
}

impl WatchSink {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Stream of progress states, starting from the current one.
    pub fn updates(&self) -> WatchStream<Option<ProgressUpdate>> {
        WatchStream::new(self.tx.subscribe())
    }

    /// Current progress state, `None` when hidden.
    pub fn current(&self) -> Option<ProgressUpdate> {
        self.tx.borrow().clone()
    }
}

impl Default for WatchSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for WatchSink {
    fn report(&self, label: &str, percent: u8) {
        let _ = self.tx.send(Some(ProgressUpdate { label: label.to_string(), percent }));
    }

    fn hide(&self) {
        let _ = self.tx.send(None);
    }
}
