//! Workload characterization.
//!
//! The source trace's time span is cut into equal percentage intervals. For
//! each interval the profile keeps how often each operation ran, which
//! targets each operation touched, and the gaps to the following operation.

use std::collections::{BTreeMap, BTreeSet};

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use crate::generate::error::GenerateError;
use crate::trace::OperationRecord;

/// How an operation affects the existence of its target key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpSemantics {
    /// Creates the target, or updates it if present
    Write,
    /// Needs the target to exist
    Read,
    /// Removes the target; needs it to exist
    Delete,
}

impl OpSemantics {
    /// Classify an operation name. Unknown operations count as reads.
    pub fn of(operation: &str) -> Self {
        match operation.to_ascii_uppercase().as_str() {
            "SET" | "SETEX" | "SETNX" | "MSET" | "HSET" | "HMSET" | "HSETNX" | "ZADD" | "SADD"
            | "LPUSH" | "RPUSH" | "INCR" | "INCRBY" | "APPEND" | "PUT" | "POST" | "PATCH" => {
                OpSemantics::Write
            }
            "DEL" | "UNLINK" | "DELETE" => OpSemantics::Delete,
            _ => OpSemantics::Read,
        }
    }
}

/// Weighted choice over a fixed set of values.
#[derive(Debug, Clone)]
pub struct Tally<T> {
    values: Vec<T>,
    counts: Vec<u64>,
    index: WeightedIndex<u64>,
}

impl<T: Ord + Clone> Tally<T> {
    fn from_counts(counts: BTreeMap<T, u64>) -> Result<Self, GenerateError> {
        let (values, counts): (Vec<T>, Vec<u64>) = counts.into_iter().unzip();
        let index = WeightedIndex::new(counts.iter().copied())
            .map_err(|e| GenerateError::Profile(e.to_string()))?;
        Ok(Self {
            values,
            counts,
            index,
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        &self.values[self.index.sample(rng)]
    }

    /// Fraction of observations that were `value`
    pub fn share(&self, value: &T) -> f64 {
        let total: u64 = self.counts.iter().sum();
        match self.values.binary_search(value) {
            Ok(i) => self.counts[i] as f64 / total as f64,
            Err(_) => 0.0,
        }
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }
}

/// Everything learned about one percentage interval.
#[derive(Debug, Clone)]
pub struct IntervalProfile {
    pub operations: Tally<String>,
    pub targets: BTreeMap<String, Tally<String>>,
    /// Gap to the next operation, in microseconds
    pub gaps_us: Tally<u64>,
}

#[derive(Debug, Clone)]
pub struct WorkloadProfile {
    /// Span of the source trace in milliseconds, at least 1
    pub duration_ms: f64,
    /// Width of each interval as a percentage of the span
    pub interval_pct: f64,
    /// Keyed by interval index; intervals without operations are absent
    pub intervals: BTreeMap<usize, IntervalProfile>,
    /// Originators seen in the source, possibly empty
    pub originators: Vec<String>,
}

#[derive(Default)]
struct IntervalCounts {
    operations: BTreeMap<String, u64>,
    targets: BTreeMap<String, BTreeMap<String, u64>>,
    gaps_us: BTreeMap<u64, u64>,
}

impl WorkloadProfile {
    /// Learn a profile from `records`, which need not be sorted.
    ///
    /// Every record except the last contributes its operation, target and
    /// the gap to its successor, so at least two records are required.
    pub fn characterize(
        records: &[OperationRecord],
        interval_pct: f64,
    ) -> Result<Self, GenerateError> {
        if !(interval_pct > 0.0 && interval_pct <= 100.0) {
            return Err(GenerateError::InvalidInterval(interval_pct));
        }
        if records.len() < 2 {
            return Err(GenerateError::TooFewRecords(records.len()));
        }

        let mut sorted: Vec<&OperationRecord> = records.iter().collect();
        sorted.sort_by(|a, b| a.sequence_timestamp.total_cmp(&b.sequence_timestamp));

        let start = sorted[0].sequence_timestamp;
        let end = sorted[sorted.len() - 1].sequence_timestamp;
        let span_ms = (end - start) * 1_000.0;
        let duration_ms = if span_ms > 0.0 { span_ms } else { 1.0 };

        let mut counts: BTreeMap<usize, IntervalCounts> = BTreeMap::new();
        let mut originators = BTreeSet::new();

        for pair in sorted.windows(2) {
            let (current, next) = (pair[0], pair[1]);
            let offset_ms = (current.sequence_timestamp - start) * 1_000.0;
            let gap_us = ((next.sequence_timestamp - current.sequence_timestamp) * 1_000_000.0)
                .round()
                .max(0.0) as u64;

            let slot = counts
                .entry(interval_index(offset_ms / duration_ms * 100.0, interval_pct))
                .or_default();
            *slot
                .operations
                .entry(current.operation_type.clone())
                .or_default() += 1;
            *slot
                .targets
                .entry(current.operation_type.clone())
                .or_default()
                .entry(current.target_key.clone())
                .or_default() += 1;
            *slot.gaps_us.entry(gap_us).or_default() += 1;

            if !current.originator_id.is_empty() {
                originators.insert(current.originator_id.clone());
            }
        }

        let mut intervals = BTreeMap::new();
        for (index, slot) in counts {
            let targets = slot
                .targets
                .into_iter()
                .map(|(op, targets)| Ok((op, Tally::from_counts(targets)?)))
                .collect::<Result<BTreeMap<_, _>, GenerateError>>()?;
            intervals.insert(
                index,
                IntervalProfile {
                    operations: Tally::from_counts(slot.operations)?,
                    targets,
                    gaps_us: Tally::from_counts(slot.gaps_us)?,
                },
            );
        }

        tracing::debug!(
            records = records.len(),
            intervals = intervals.len(),
            duration_ms,
            "Workload characterized"
        );
        Ok(Self {
            duration_ms,
            interval_pct,
            intervals,
            originators: originators.into_iter().collect(),
        })
    }

    /// Profile for the interval containing `percent` of the source span.
    ///
    /// Falls back to the nearest populated interval before it, then to the
    /// first populated interval.
    pub fn interval_at(&self, percent: f64) -> Option<&IntervalProfile> {
        let index = interval_index(percent, self.interval_pct);
        self.intervals
            .range(..=index)
            .next_back()
            .or_else(|| self.intervals.iter().next())
            .map(|(_, profile)| profile)
    }
}

fn interval_index(percent: f64, interval_pct: f64) -> usize {
    // The final record sits at exactly 100%; keep it in the last interval.
    let percent = percent.clamp(0.0, 100.0 - 1e-9);
    (percent / interval_pct).floor() as usize
}
