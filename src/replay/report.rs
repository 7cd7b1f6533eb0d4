//! Run statistics and the final replay report.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::backend::BackendKind;
use crate::replay::aggregator::ReportMode;
use crate::replay::engine::LaneFailurePolicy;

/// Value at quantile `q` of an ascending-sorted slice.
///
/// Index is `floor(len * q)`, clamped to the last element. `None` when empty.
pub fn percentile(sorted: &[Duration], q: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64) * q).floor() as usize;
    Some(sorted[idx.min(sorted.len() - 1)])
}

/// Latency distribution of successful operations, in nanoseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: usize,
    pub mean_ns: f64,
    pub min_ns: u64,
    pub max_ns: u64,
    pub p50_ns: u64,
    pub p90_ns: u64,
    pub p99_ns: u64,
}

impl LatencySummary {
    pub fn from_latencies(latencies: &[Duration]) -> Option<Self> {
        if latencies.is_empty() {
            return None;
        }
        let mut sorted = latencies.to_vec();
        sorted.sort_unstable();

        let total: u128 = sorted.iter().map(Duration::as_nanos).sum();
        let ns = |q: f64| percentile(&sorted, q).map_or(0, as_nanos);

        Some(Self {
            count: sorted.len(),
            mean_ns: total as f64 / sorted.len() as f64,
            min_ns: as_nanos(sorted[0]),
            max_ns: as_nanos(sorted[sorted.len() - 1]),
            p50_ns: ns(0.50),
            p90_ns: ns(0.90),
            p99_ns: ns(0.99),
        })
    }
}

fn as_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Counters and derived figures produced by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeSummary {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Percent of attempted operations that succeeded
    pub success_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_ops_per_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySummary>,
}

/// Everything known about a finished replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub backend: BackendKind,
    pub lanes: usize,
    pub mode: ReportMode,
    pub on_lane_failure: LaneFailurePolicy,
    pub dispatched: u64,
    pub malformed: u64,
    /// Tasks pushed to a lane that had already gone away
    pub orphaned: u64,
    pub failed_lanes: Vec<usize>,
    pub per_lane: Vec<u64>,
    pub wall_clock_ms: f64,
    pub outcome: OutcomeSummary,
}

impl ReplayReport {
    pub fn wall_clock(&self) -> Duration {
        Duration::from_secs_f64(self.wall_clock_ms / 1_000.0)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn ms(ns: u64) -> f64 {
    ns as f64 / 1_000_000.0
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Replay {} ({})", self.run_id, self.started_at.to_rfc3339())?;
        writeln!(
            f,
            "  backend: {}  lanes: {}  mode: {}",
            self.backend,
            self.lanes,
            self.mode.as_str()
        )?;
        writeln!(
            f,
            "  dispatched: {}  malformed: {}  orphaned: {}",
            self.dispatched, self.malformed, self.orphaned
        )?;
        if !self.failed_lanes.is_empty() {
            let lanes: Vec<String> = self.failed_lanes.iter().map(ToString::to_string).collect();
            writeln!(f, "  failed lanes: {}", lanes.join(", "))?;
        }

        let outcome = &self.outcome;
        writeln!(
            f,
            "  succeeded: {}  failed: {}",
            outcome.succeeded, outcome.failed
        )?;
        match outcome.success_rate {
            Some(rate) => writeln!(f, "  success rate: {rate:.2}%")?,
            None => writeln!(f, "  success rate: n/a")?,
        }
        writeln!(f, "  wall clock: {:.3} ms", self.wall_clock_ms)?;

        if let Some(tput) = outcome.throughput_ops_per_sec {
            writeln!(f, "  throughput: {tput:.2} ops/s")?;
        }
        if let Some(lat) = &outcome.latency {
            writeln!(
                f,
                "  latency (ms): mean {:.3}  min {:.3}  max {:.3}",
                lat.mean_ns / 1_000_000.0,
                ms(lat.min_ns),
                ms(lat.max_ns)
            )?;
            writeln!(
                f,
                "                p50 {:.3}  p90 {:.3}  p99 {:.3}",
                ms(lat.p50_ns),
                ms(lat.p90_ns),
                ms(lat.p99_ns)
            )?;
        }
        Ok(())
    }
}
