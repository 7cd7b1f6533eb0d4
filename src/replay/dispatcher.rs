use std::time::Duration;

use tokio::time::Instant;

use crate::replay::error::ReplayError;
use crate::replay::queue::{LaneMessage, LaneSender, ScheduledTask};
use crate::trace::TraceEntry;

/// Nanoseconds between the trace origin and `timestamp`.
///
/// Rounded to the nearest nanosecond. Timestamps before the origin, and
/// non-finite deltas, schedule immediately.
pub fn offset_nanos(origin: f64, timestamp: f64) -> u64 {
    let delta = (timestamp - origin) * 1e9;
    if !delta.is_finite() || delta <= 0.0 {
        return 0;
    }
    if delta >= u64::MAX as f64 {
        return u64::MAX;
    }
    delta.round() as u64
}

/// Counts from one pass over the trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub dispatched: u64,
    pub malformed: u64,
    /// Tasks whose lane had already exited when they were pushed
    pub orphaned: u64,
    /// Tasks assigned per dispatcher slot, in the order lanes were given
    pub per_lane: Vec<u64>,
    pub benchmark_start: Option<Instant>,
}

/// Turns trace entries into scheduled tasks and deals them round-robin.
pub struct Dispatcher {
    lanes: Vec<LaneSender>,
}

impl Dispatcher {
    pub fn new(lanes: Vec<LaneSender>) -> Result<Self, ReplayError> {
        if lanes.is_empty() {
            return Err(ReplayError::NoLanes);
        }
        Ok(Self { lanes })
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Lane ids in slot order
    pub fn lane_ids(&self) -> Vec<usize> {
        self.lanes.iter().map(LaneSender::lane).collect()
    }

    /// Dispatch every entry, then push one shutdown sentinel to each lane.
    ///
    /// Malformed entries are logged and skipped without taking a slot. The
    /// first valid record fixes both the trace origin and `benchmark_start`.
    pub fn dispatch<I>(&self, entries: I) -> DispatchSummary
    where
        I: IntoIterator<Item = TraceEntry>,
    {
        let mut summary = DispatchSummary {
            per_lane: vec![0; self.lanes.len()],
            ..DispatchSummary::default()
        };
        let mut origin: Option<(f64, Instant)> = None;
        let mut counter: usize = 0;

        for entry in entries {
            let record = match entry {
                Ok(record) => record,
                Err(malformed) => {
                    tracing::warn!(
                        line = malformed.line,
                        reason = %malformed.reason,
                        "Skipping malformed trace entry"
                    );
                    summary.malformed += 1;
                    continue;
                }
            };

            let (trace_origin, benchmark_start) =
                *origin.get_or_insert_with(|| (record.sequence_timestamp, Instant::now()));
            let offset = offset_nanos(trace_origin, record.sequence_timestamp);
            let fire_at = benchmark_start + Duration::from_nanos(offset);

            let slot = counter % self.lanes.len();
            counter += 1;

            let sender = &self.lanes[slot];
            match sender.push(LaneMessage::Task(ScheduledTask { fire_at, record })) {
                Ok(()) => {
                    summary.dispatched += 1;
                    summary.per_lane[slot] += 1;
                }
                Err(closed) => {
                    tracing::debug!(lane = closed.0, "Task orphaned on exited lane");
                    summary.orphaned += 1;
                }
            }
        }

        for sender in &self.lanes {
            if sender.push(LaneMessage::Shutdown).is_err() {
                tracing::debug!(lane = sender.lane(), "Lane already exited before shutdown");
            }
        }

        summary.benchmark_start = origin.map(|(_, start)| start);
        tracing::info!(
            dispatched = summary.dispatched,
            malformed = summary.malformed,
            orphaned = summary.orphaned,
            lanes = self.lanes.len(),
            "Dispatch complete"
        );
        summary
    }
}
