//! Device search: one-shot runs and the repeating background schedule.
//!
//! A search is detect-then-process: probe every registered driver, then walk
//! each driver that found hardware through the full pipeline, one at a time
//! and in declaration order, stopping at the first driver whose run fails.
//! The repeating schedule re-runs the search on a fixed interval; a tick that
//! lands while the previous run is still going is skipped outright, and
//! cancelling the schedule stops future ticks without ever aborting a run
//! already in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::manager::{DriverManager, RunResult};
use crate::progress::{ProgressMap, ProgressSink};
use crate::registry::DriverRegistry;

/// What one search run produced.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Drivers whose detection reported hardware, declaration order.
    pub detected: Vec<String>,
    /// Pipeline results, one per processed driver. Shorter than `detected`
    /// when an earlier run failed and stopped the series.
    pub runs: Vec<RunResult>,
}

impl SearchOutcome {
    /// True when every detected driver ran the pipeline to completion.
    pub fn is_complete(&self) -> bool {
        self.runs.len() == self.detected.len() && self.runs.iter().all(RunResult::is_success)
    }

    /// The error that stopped the run series, if any.
    pub fn first_error(&self) -> Option<&crate::error::DeviceError> {
        self.runs.iter().find_map(|r| r.error.as_ref())
    }
}

/// Runs searches against one registry. Cloning is cheap; clones share the
/// registry and progress sink but each run still gets fresh driver instances.
#[derive(Clone)]
pub struct SearchController {
    registry: Arc<DriverRegistry>,
    sink: Arc<dyn ProgressSink>,
    map: ProgressMap,
}

impl SearchController {
    pub fn new(registry: Arc<DriverRegistry>, sink: Arc<dyn ProgressSink>, map: ProgressMap) -> Self {
        Self { registry, sink, map }
    }

    /// One full search: detect across all drivers, then process each driver
    /// that found hardware, in series.
    ///
    /// A detection failure anywhere fails the search. A pipeline failure does
    /// not: the failed run is the last entry in the outcome's `runs` and the
    /// remaining detected drivers are left unprocessed.
    pub async fn run(&self) -> Result<SearchOutcome> {
        let enabled = self.registry.enabled_names();
        let mut manager =
            DriverManager::new(&self.registry, &enabled, Arc::clone(&self.sink), self.map.clone());

        let detected = manager.detect().await?;
        info!(detected = detected.len(), "search detection complete");

        let mut runs = Vec::new();
        for name in &detected {
            let run = manager.process(name).await;
            let failed = !run.is_success();
            runs.push(run);
            if failed {
                warn!(driver = %name, "pipeline failed, stopping this search");
                break;
            }
        }
        Ok(SearchOutcome { detected, runs })
    }

    /// Start a repeating search every `period`, first run one period from
    /// now. Each run is independent: fresh driver instances, its result
    /// delivered through the returned schedule.
    pub fn repeat(&self, period: Duration) -> SearchSchedule {
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = self.clone();
        let busy = Arc::new(AtomicBool::new(false));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick of a tokio interval is immediate; consume it so
            // the first search happens one full period after start.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel_task.cancelled() => {
                        debug!("search schedule cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        if busy
                            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                            .is_err()
                        {
                            debug!("previous search still running, skipping this tick");
                            continue;
                        }
                        let controller = controller.clone();
                        let busy = Arc::clone(&busy);
                        let tx = tx.clone();
                        // Detached on purpose: cancelling the schedule must
                        // never abort a search already in flight.
                        tokio::spawn(async move {
                            let outcome = controller.run().await;
                            busy.store(false, Ordering::Release);
                            let _ = tx.send(outcome);
                        });
                    }
                }
            }
        });

        SearchSchedule { cancel, rx }
    }
}

/// Handle to a repeating search started by [`SearchController::repeat`].
///
/// Dropping the schedule cancels it, same as [`SearchSchedule::cancel`].
pub struct SearchSchedule {
    cancel: CancellationToken,
    rx: mpsc::UnboundedReceiver<Result<SearchOutcome>>,
}

impl SearchSchedule {
    /// The next run's outcome. `None` once the schedule is cancelled and
    /// every in-flight run has delivered.
    pub async fn next(&mut self) -> Option<Result<SearchOutcome>> {
        self.rx.recv().await
    }

    /// Stop scheduling new runs. A run already in flight keeps going and its
    /// outcome still arrives through [`SearchSchedule::next`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for SearchSchedule {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::PipelineStage;
    use crate::error::DeviceError;
    use crate::progress::NullSink;
    use crate::registry::DriverConfig;
    use crate::test_utils::{ScriptedDriver, SharedScript};

    fn controller_for(scripts: Vec<(&str, SharedScript)>) -> SearchController {
        let mut builder = DriverRegistry::builder();
        for (name, script) in scripts {
            builder = builder.enabled_driver(name, DriverConfig::default(), move |_cfg| {
                ScriptedDriver::from_script(script.clone())
            });
        }
        SearchController::new(Arc::new(builder.build()), Arc::new(NullSink), ProgressMap::default())
    }

    #[tokio::test(start_paused = true)]
    async fn run_processes_detected_drivers_in_series() {
        let a = SharedScript::detecting(&["a1"]);
        let b = SharedScript::detecting(&[]);
        let c = SharedScript::detecting(&["c1"]);
        let controller =
            controller_for(vec![("A", a.clone()), ("B", b.clone()), ("C", c.clone())]);

        let outcome = controller.run().await.unwrap();
        assert_eq!(outcome.detected, vec!["A".to_string(), "C".to_string()]);
        assert!(outcome.is_complete());
        assert_eq!(outcome.runs.len(), 2);
        assert_eq!(outcome.runs[0].driver, "A");
        assert_eq!(outcome.runs[1].driver, "C");
        // The driver that found nothing never entered the pipeline.
        assert_eq!(b.stage_calls(PipelineStage::Setup), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_stops_the_series() {
        let a = SharedScript::detecting(&["a1"]);
        a.fail_at(PipelineStage::Connect, "cable gone");
        let b = SharedScript::detecting(&["b1"]);
        let controller = controller_for(vec![("A", a), ("B", b.clone())]);

        let outcome = controller.run().await.unwrap();
        assert_eq!(outcome.detected.len(), 2);
        assert_eq!(outcome.runs.len(), 1);
        assert!(!outcome.is_complete());
        assert!(!outcome.runs[0].is_success());
        // B was detected but never processed.
        assert_eq!(b.stage_calls(PipelineStage::Setup), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn detection_failure_fails_the_search() {
        let a = SharedScript::failing_detect("bus error");
        let controller = controller_for(vec![("A", a)]);

        let err = controller.run().await.unwrap_err();
        assert!(matches!(err, DeviceError::Detection { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_ticks_are_skipped_and_cancel_spares_the_inflight_run() {
        crate::test_utils::init_tracing();
        // Each run takes 7s (8 stages at 875ms); ticks come every 5s.
        let script = SharedScript::detecting(&["m1"]);
        script.stage_delay(Duration::from_millis(875));
        let controller = controller_for(vec![("Meter", script.clone())]);

        let mut schedule = controller.repeat(Duration::from_secs(5));

        // First run starts at t=5s and finishes around t=12s; the t=10s tick
        // lands mid-run and is skipped.
        let first = schedule.next().await.unwrap().unwrap();
        assert!(first.is_complete());
        assert_eq!(script.detect_calls(), 1);

        // Second run starts at t=15s. Cancel at t=16s: the in-flight run
        // still completes and delivers.
        tokio::time::sleep(Duration::from_secs(4)).await;
        schedule.cancel();

        let second = schedule.next().await.unwrap().unwrap();
        assert!(second.is_complete());
        assert_eq!(script.detect_calls(), 2);

        // No further runs after cancellation.
        assert!(schedule.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_the_first_tick_means_no_runs_at_all() {
        let script = SharedScript::detecting(&["m1"]);
        let controller = controller_for(vec![("Meter", script.clone())]);

        let mut schedule = controller.repeat(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(10)).await;
        schedule.cancel();

        assert!(schedule.next().await.is_none());
        assert_eq!(script.detect_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_schedule_cancels_it() {
        let script = SharedScript::detecting(&["m1"]);
        let controller = controller_for(vec![("Meter", script.clone())]);

        let schedule = controller.repeat(Duration::from_secs(5));
        drop(schedule);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(script.detect_calls(), 0);
    }
}
