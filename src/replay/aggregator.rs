use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::replay::report::{LatencySummary, OutcomeSummary};

/// Result of executing one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub latency: Duration,
    pub success: bool,
}

impl ExecutionOutcome {
    pub fn success(latency: Duration) -> Self {
        Self {
            latency,
            success: true,
        }
    }

    /// Failed outcomes carry no latency.
    pub fn failure() -> Self {
        Self {
            latency: Duration::ZERO,
            success: false,
        }
    }
}

/// How much the aggregator keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Success and error counters only
    Counting,
    /// Counters plus every successful latency, for percentiles and throughput
    #[default]
    Latency,
}

impl ReportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportMode::Counting => "counting",
            ReportMode::Latency => "latency",
        }
    }
}

/// Shared sink for outcomes from every lane of one run.
///
/// Counters are lock-free; the latency sequence is appended under a single
/// mutex in arrival order. Read it only after all lanes have been joined.
#[derive(Debug)]
pub struct Aggregator {
    mode: ReportMode,
    success_count: AtomicU64,
    error_count: AtomicU64,
    latencies: Mutex<Vec<Duration>>,
}

impl Aggregator {
    pub fn new(mode: ReportMode) -> Self {
        Self {
            mode,
            success_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            latencies: Mutex::new(Vec::new()),
        }
    }

    pub fn mode(&self) -> ReportMode {
        self.mode
    }

    pub fn record(&self, outcome: ExecutionOutcome) {
        if outcome.success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
            if self.mode == ReportMode::Latency {
                self.latencies.lock().push(outcome.latency);
            }
        } else {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Acquire)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Acquire)
    }

    /// Latencies in arrival order
    pub fn latencies(&self) -> Vec<Duration> {
        self.latencies.lock().clone()
    }

    /// Final statistics. `wall_clock` spans dispatch start to the last join.
    pub fn summarize(&self, wall_clock: Duration) -> OutcomeSummary {
        let succeeded = self.success_count();
        let failed = self.error_count();
        let attempted = succeeded + failed;

        let success_rate = (attempted > 0).then(|| succeeded as f64 / attempted as f64 * 100.0);

        let (throughput, latency) = match self.mode {
            ReportMode::Counting => (None, None),
            ReportMode::Latency => {
                let secs = wall_clock.as_secs_f64();
                let throughput = (secs > 0.0).then(|| succeeded as f64 / secs);
                (throughput, LatencySummary::from_latencies(&self.latencies()))
            }
        };

        OutcomeSummary {
            attempted,
            succeeded,
            failed,
            success_rate,
            throughput_ops_per_sec: throughput,
            latency,
        }
    }
}
