//! Descriptive statistics of a trace file.
//!
//! Used to compare a captured workload with a synthetic one generated from
//! it, or with what a backend saw during replay.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::trace::parser::{read_trace, TraceError, TraceParser};
use crate::trace::record::TraceEntry;

/// Share of one operation type in a trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandShare {
    pub operation: String,
    pub count: usize,
    /// Fraction of all operations, 0.0..=1.0
    pub proportion: f64,
}

/// Gaps between consecutive operations, in milliseconds.
///
/// Percentiles interpolate linearly between the two nearest ranks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterArrivalStats {
    pub count: usize,
    pub mean_ms: f64,
    /// Sample standard deviation; absent for a single gap
    pub std_ms: Option<f64>,
    pub min_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl InterArrivalStats {
    fn from_gaps(mut gaps: Vec<f64>) -> Option<Self> {
        if gaps.is_empty() {
            return None;
        }
        gaps.sort_by(f64::total_cmp);

        let n = gaps.len() as f64;
        let mean = gaps.iter().sum::<f64>() / n;
        let std_ms = (gaps.len() > 1).then(|| {
            let var = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        });

        Some(Self {
            count: gaps.len(),
            mean_ms: mean,
            std_ms,
            min_ms: gaps[0],
            p50_ms: interpolated(&gaps, 0.50),
            p90_ms: interpolated(&gaps, 0.90),
            p95_ms: interpolated(&gaps, 0.95),
            p99_ms: interpolated(&gaps, 0.99),
            max_ms: gaps[gaps.len() - 1],
        })
    }
}

/// Linear interpolation between closest ranks of a non-empty sorted slice.
fn interpolated(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStats {
    pub operations: usize,
    pub malformed: usize,
    /// Last timestamp minus first, in seconds
    pub duration_secs: f64,
    /// Operations per second over `duration_secs`; 0 when the trace spans no time
    pub throughput_ops_per_sec: f64,
    /// Most frequent first
    pub commands: Vec<CommandShare>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inter_arrival: Option<InterArrivalStats>,
    /// Operation count for each whole second since the first timestamp
    pub ops_per_second: Vec<u64>,
}

impl TraceStats {
    /// Compute statistics over parsed entries. Records are ordered by
    /// timestamp first; malformed entries are only counted.
    pub fn from_entries(entries: &[TraceEntry]) -> Self {
        let mut records: Vec<_> = entries.iter().filter_map(|e| e.as_ref().ok()).collect();
        let malformed = entries.len() - records.len();
        records.sort_by(|a, b| a.sequence_timestamp.total_cmp(&b.sequence_timestamp));

        let (first, last) = match (records.first(), records.last()) {
            (Some(first), Some(last)) => (first.sequence_timestamp, last.sequence_timestamp),
            _ => {
                return Self {
                    operations: 0,
                    malformed,
                    duration_secs: 0.0,
                    throughput_ops_per_sec: 0.0,
                    commands: Vec::new(),
                    inter_arrival: None,
                    ops_per_second: Vec::new(),
                }
            }
        };
        let duration_secs = last - first;
        let operations = records.len();

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &records {
            *counts.entry(record.operation_type.as_str()).or_default() += 1;
        }
        let mut commands: Vec<CommandShare> = counts
            .into_iter()
            .map(|(operation, count)| CommandShare {
                operation: operation.to_string(),
                count,
                proportion: count as f64 / operations as f64,
            })
            .collect();
        commands.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.operation.cmp(&b.operation)));

        let gaps: Vec<f64> = records
            .windows(2)
            .map(|w| (w[1].sequence_timestamp - w[0].sequence_timestamp) * 1_000.0)
            .collect();

        let mut ops_per_second = vec![0u64; duration_secs.floor() as usize + 1];
        for record in &records {
            let second = (record.sequence_timestamp - first).floor() as usize;
            let last = ops_per_second.len() - 1;
            ops_per_second[second.min(last)] += 1;
        }

        Self {
            operations,
            malformed,
            duration_secs,
            throughput_ops_per_sec: if duration_secs > 0.0 {
                operations as f64 / duration_secs
            } else {
                0.0
            },
            commands,
            inter_arrival: InterArrivalStats::from_gaps(gaps),
            ops_per_second,
        }
    }

    /// Read `path` with `parser` and compute its statistics.
    pub fn from_file(path: &Path, parser: &dyn TraceParser) -> Result<Self, TraceError> {
        let entries = read_trace(path, parser)?;
        Ok(Self::from_entries(&entries))
    }

    /// Busiest whole second, as (second, operations)
    pub fn peak_second(&self) -> Option<(usize, u64)> {
        self.ops_per_second
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
    }
}

impl fmt::Display for TraceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  operations: {}  malformed: {}",
            self.operations, self.malformed
        )?;
        writeln!(f, "  duration: {:.2} s", self.duration_secs)?;
        writeln!(f, "  throughput: {:.2} ops/s", self.throughput_ops_per_sec)?;
        if let Some((second, ops)) = self.peak_second() {
            writeln!(f, "  peak second: {second} ({ops} ops)")?;
        }

        match &self.inter_arrival {
            Some(gaps) => {
                writeln!(
                    f,
                    "  inter-arrival (ms): mean {:.3}  std {}  min {:.3}  max {:.3}",
                    gaps.mean_ms,
                    gaps.std_ms.map_or_else(|| "n/a".to_string(), |s| format!("{s:.3}")),
                    gaps.min_ms,
                    gaps.max_ms
                )?;
                writeln!(
                    f,
                    "                      p50 {:.3}  p90 {:.3}  p95 {:.3}  p99 {:.3}",
                    gaps.p50_ms, gaps.p90_ms, gaps.p95_ms, gaps.p99_ms
                )?;
            }
            None => writeln!(f, "  inter-arrival: n/a")?,
        }

        if !self.commands.is_empty() {
            writeln!(f, "  commands:")?;
            for share in &self.commands {
                writeln!(
                    f,
                    "    {:<10} {:>8}  {:>6.2}%",
                    share.operation,
                    share.count,
                    share.proportion * 100.0
                )?;
            }
        }
        Ok(())
    }
}
