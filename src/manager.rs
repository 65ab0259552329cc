//! Driver manager: detection fan-out and the eight-stage pipeline.
//!
//! The manager owns one scoped set of driver instances. `detect` probes all
//! of them concurrently and joins at a single point; `process` walks one
//! driver through the eight lifecycle stages strictly in sequence,
//! short-circuiting on the first error while keeping whatever partial results
//! had accumulated. Either way the progress surface is taken down a fixed
//! short delay after the run ends, so a failure never leaves a stale
//! indicator behind.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::driver::{Capability, Driver, PipelineStage, StageOutcome};
use crate::error::{DeviceError, Result};
use crate::progress::{ProgressMap, ProgressReporter, ProgressSink, StageProgress};
use crate::registry::DriverRegistry;

/// How long a finished run's progress indicator stays visible.
pub const HIDE_DELAY: Duration = Duration::from_secs(1);

struct ManagedDriver {
    name: String,
    driver: Box<dyn Driver>,
}

/// Outcome of running one driver through the pipeline: either every stage's
/// outcome, or the first error plus the outcomes of the stages that ran.
#[derive(Debug)]
pub struct RunResult {
    pub driver: String,
    pub completed: Vec<StageOutcome>,
    pub error: Option<DeviceError>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The last completed stage's outcome (the cleanup outcome on a full
    /// run).
    pub fn final_outcome(&self) -> Option<&StageOutcome> {
        self.completed.last()
    }
}

/// Orchestrates a scoped set of driver instances.
pub struct DriverManager {
    drivers: Vec<ManagedDriver>,
    reporter: ProgressReporter,
}

impl DriverManager {
    /// Instantiate every registered driver, enable the named subset, and
    /// audit capabilities.
    ///
    /// A missing capability is a configuration defect surfaced at startup:
    /// it is logged, never fatal — the driver stays registered and the
    /// affected stage fails loudly if it is ever run.
    pub fn new(
        registry: &DriverRegistry,
        enabled: &[String],
        sink: Arc<dyn ProgressSink>,
        map: ProgressMap,
    ) -> Self {
        let mut drivers = Vec::new();
        for entry in registry.entries() {
            let mut driver = entry.instantiate();
            audit_capabilities(entry.name(), driver.as_ref());
            driver.disable();
            drivers.push(ManagedDriver { name: entry.name().to_string(), driver });
        }
        for name in enabled {
            match drivers.iter_mut().find(|d| &d.name == name) {
                Some(d) => d.driver.enable(),
                None => warn!(driver = %name, "enable requested for unregistered driver"),
            }
        }
        Self { drivers, reporter: ProgressReporter::new(sink, map) }
    }

    /// Run every driver's `detect` concurrently and join.
    ///
    /// Failure is absolute: the first failing detector (declaration order)
    /// fails the whole round, partial successes included. On success, returns
    /// the names whose detect reported at least one device, declaration order
    /// preserved.
    pub async fn detect(&mut self) -> Result<Vec<String>> {
        debug!(drivers = self.drivers.len(), "running detection");
        let probes = self.drivers.iter_mut().map(|md| {
            let ManagedDriver { name, driver } = md;
            async move { (name.clone(), driver.detect().await) }
        });
        let results = join_all(probes).await;

        let mut found = Vec::new();
        for (name, result) in results {
            match result {
                Ok(ids) if !ids.is_empty() => {
                    info!(driver = %name, devices = ids.len(), "detected");
                    found.push(name);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(driver = %name, error = %e, "detection failed, failing the batch");
                    return Err(DeviceError::detection_failed(name, e));
                }
            }
        }
        Ok(found)
    }

    /// Run the named driver through the eight pipeline stages in order.
    ///
    /// Stage N+1 never starts before stage N resolves; the first error stops
    /// the run and rides back in the [`RunResult`] together with the partial
    /// outcomes.
    pub async fn process(&mut self, name: &str) -> RunResult {
        let Some(md) = self.drivers.iter_mut().find(|d| d.name == name) else {
            self.reporter.hide_after(HIDE_DELAY);
            return RunResult {
                driver: name.to_string(),
                completed: Vec::new(),
                error: Some(DeviceError::UnknownDriver { name: name.to_string() }),
            };
        };

        let capabilities: Vec<Capability> = md.driver.capabilities().to_vec();
        let mut completed = Vec::new();
        let mut error = None;

        for stage in PipelineStage::ALL {
            let progress = self.reporter.stage(stage);
            let result = if capabilities.contains(&stage.capability()) {
                run_stage(md.driver.as_mut(), stage, progress).await
            } else {
                Err(DeviceError::missing_capability(name, stage.capability().name()))
            };
            match result {
                Ok(outcome) => {
                    debug!(driver = %name, %stage, "stage complete");
                    completed.push(outcome);
                }
                Err(e) => {
                    warn!(driver = %name, %stage, error = %e, "stage failed, aborting run");
                    error = Some(DeviceError::stage_failed(name, stage, e));
                    break;
                }
            }
        }

        self.reporter.hide_after(HIDE_DELAY);
        RunResult { driver: name.to_string(), completed, error }
    }
}

async fn run_stage(
    driver: &mut dyn Driver,
    stage: PipelineStage,
    progress: StageProgress,
) -> Result<StageOutcome> {
    match stage {
        PipelineStage::Setup => driver.setup(progress).await,
        PipelineStage::Connect => driver.connect(progress).await,
        PipelineStage::GetConfigInfo => driver.get_config_info(progress).await,
        PipelineStage::FetchData => driver.fetch_data(progress).await,
        PipelineStage::ProcessData => driver.process_data(progress).await,
        PipelineStage::UploadData => driver.upload_data(progress).await,
        PipelineStage::Disconnect => driver.disconnect(progress).await,
        PipelineStage::Cleanup => driver.cleanup(progress).await,
    }
}

fn audit_capabilities(name: &str, driver: &dyn Driver) {
    let present = driver.capabilities();
    for required in Capability::ALL {
        if !present.contains(&required) {
            let defect = DeviceError::missing_capability(name, required.name());
            warn!(driver = %name, capability = %required, "{defect}");
        }
    }
}
