//! Replay orchestration: lane startup, dispatch, join, report.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::backend::StrategyFactory;
use crate::replay::aggregator::{Aggregator, ReportMode};
use crate::replay::dispatcher::Dispatcher;
use crate::replay::error::ReplayError;
use crate::replay::lane::{spawn_lane, LaneHandle};
use crate::replay::queue::{lane_queue, LaneMessage, LaneSender};
use crate::replay::report::ReplayReport;
use crate::trace::{read_trace, TraceEntry, TraceFormat};

/// What to do when a lane cannot connect to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneFailurePolicy {
    /// Fail the run before dispatching anything
    #[default]
    Abort,
    /// Dispatch round-robin over the lanes that did connect
    Skip,
    /// Keep all lanes in the rotation; records for dead lanes are dropped
    /// and counted as orphaned
    Orphan,
}

impl LaneFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaneFailurePolicy::Abort => "abort",
            LaneFailurePolicy::Skip => "skip",
            LaneFailurePolicy::Orphan => "orphan",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Some(LaneFailurePolicy::Abort),
            "skip" => Some(LaneFailurePolicy::Skip),
            "orphan" => Some(LaneFailurePolicy::Orphan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    pub lanes: usize,
    pub on_lane_failure: LaneFailurePolicy,
    pub report_mode: ReportMode,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            lanes: 4,
            on_lane_failure: LaneFailurePolicy::default(),
            report_mode: ReportMode::default(),
        }
    }
}

impl ReplayOptions {
    pub fn with_lanes(mut self, lanes: usize) -> Self {
        self.lanes = lanes;
        self
    }

    pub fn with_policy(mut self, policy: LaneFailurePolicy) -> Self {
        self.on_lane_failure = policy;
        self
    }

    pub fn with_report_mode(mut self, mode: ReportMode) -> Self {
        self.report_mode = mode;
        self
    }
}

/// Runs one trace across a fixed set of lanes and reports what happened.
pub struct Replayer {
    options: ReplayOptions,
    factory: Arc<dyn StrategyFactory>,
}

impl Replayer {
    pub fn new(options: ReplayOptions, factory: Arc<dyn StrategyFactory>) -> Self {
        Self { options, factory }
    }

    pub fn options(&self) -> &ReplayOptions {
        &self.options
    }

    /// Load a trace file and replay it.
    pub async fn run_file(
        &self,
        path: &Path,
        format: TraceFormat,
    ) -> Result<ReplayReport, ReplayError> {
        let parser = format.parser();
        let entries = read_trace(path, parser.as_ref())?;
        tracing::info!(
            path = %path.display(),
            format = %format,
            entries = entries.len(),
            "Trace loaded"
        );
        self.run(entries).await
    }

    /// Replay already-parsed entries.
    ///
    /// Every lane connects before the first task is dispatched. Lanes that
    /// fail to connect are handled according to the configured
    /// [`LaneFailurePolicy`].
    pub async fn run(&self, entries: Vec<TraceEntry>) -> Result<ReplayReport, ReplayError> {
        let lane_count = self.options.lanes;
        if lane_count == 0 {
            return Err(ReplayError::NoLanes);
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let aggregator = Arc::new(Aggregator::new(self.options.report_mode));

        let mut senders = Vec::with_capacity(lane_count);
        let mut handles = Vec::with_capacity(lane_count);
        for id in 0..lane_count {
            let (tx, rx) = lane_queue(id);
            match spawn_lane(id, self.factory.clone(), rx, aggregator.clone()) {
                Ok(handle) => {
                    senders.push(tx);
                    handles.push(handle);
                }
                Err(err) => {
                    shutdown(&senders, handles).await;
                    return Err(err);
                }
            }
        }

        let mut failed: Vec<(usize, String)> = Vec::new();
        for handle in handles.iter_mut() {
            if let Err(reason) = handle.wait_ready().await {
                failed.push((handle.lane(), reason));
            }
        }

        let failed_lanes: Vec<usize> = failed.iter().map(|(lane, _)| *lane).collect();
        if let Some((lane, reason)) = failed.first().cloned() {
            match self.options.on_lane_failure {
                LaneFailurePolicy::Abort => {
                    tracing::error!(lane, reason = %reason, "Aborting replay after lane setup failure");
                    shutdown(&senders, handles).await;
                    return Err(ReplayError::LaneSetup { lane, reason });
                }
                LaneFailurePolicy::Skip | LaneFailurePolicy::Orphan => {
                    tracing::warn!(
                        failed = failed_lanes.len(),
                        policy = self.options.on_lane_failure.as_str(),
                        "Continuing with failed lanes"
                    );
                    // Dead lanes exit on their own; joining them here means
                    // their queues are closed before dispatch begins.
                    let (dead, live): (Vec<_>, Vec<_>) = handles
                        .into_iter()
                        .partition(|h| failed_lanes.contains(&h.lane()));
                    handles = live;
                    for handle in dead {
                        let lane = handle.lane();
                        if let Err(err) = handle.join().await {
                            tracing::warn!(lane, error = %err, "Failed lane did not exit cleanly");
                        }
                    }
                }
            }
        }

        let dispatch_lanes: Vec<LaneSender> = match self.options.on_lane_failure {
            LaneFailurePolicy::Skip => senders
                .into_iter()
                .filter(|tx| !failed_lanes.contains(&tx.lane()))
                .collect(),
            _ => senders,
        };
        if dispatch_lanes.is_empty() {
            return Err(ReplayError::NoLiveLanes);
        }

        tracing::info!(
            %run_id,
            lanes = dispatch_lanes.len(),
            backend = %self.factory.backend(),
            "Lanes ready, dispatching"
        );

        let dispatch_start = Instant::now();
        let dispatcher = Dispatcher::new(dispatch_lanes)?;
        let lane_ids = dispatcher.lane_ids();
        let summary = dispatcher.dispatch(entries);
        drop(dispatcher);

        for handle in handles {
            let report = handle.join().await?;
            tracing::debug!(lane = report.lane, executed = report.executed, "Lane joined");
        }
        let wall_clock = dispatch_start.elapsed();

        let mut per_lane = vec![0; lane_count];
        for (slot, lane) in lane_ids.iter().enumerate() {
            per_lane[*lane] = summary.per_lane[slot];
        }

        let report = ReplayReport {
            run_id,
            started_at,
            backend: self.factory.backend(),
            lanes: lane_count,
            mode: self.options.report_mode,
            on_lane_failure: self.options.on_lane_failure,
            dispatched: summary.dispatched,
            malformed: summary.malformed,
            orphaned: summary.orphaned,
            failed_lanes,
            per_lane,
            wall_clock_ms: wall_clock.as_secs_f64() * 1_000.0,
            outcome: aggregator.summarize(wall_clock),
        };
        tracing::info!(
            %run_id,
            succeeded = report.outcome.succeeded,
            failed = report.outcome.failed,
            wall_clock_ms = report.wall_clock_ms,
            "Replay finished"
        );
        Ok(report)
    }
}

/// Send every lane its sentinel and wait for all of them to exit.
async fn shutdown(senders: &[LaneSender], handles: Vec<LaneHandle>) {
    for tx in senders {
        let _ = tx.push(LaneMessage::Shutdown);
    }
    for handle in handles {
        if let Err(err) = handle.join().await {
            tracing::warn!(error = %err, "Lane did not shut down cleanly");
        }
    }
}
