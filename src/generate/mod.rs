//! Synthetic workload generation.
//!
//! A captured trace is characterized into a [`WorkloadProfile`], which is then
//! sampled to produce a new trace of any length with the same mix of
//! operations, key popularity and pacing over time.

pub mod error;
pub mod profile;
pub mod synth;

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::trace::{read_trace, OperationRecord, TraceFormat, TraceParser};

pub use error::GenerateError;
pub use profile::{IntervalProfile, OpSemantics, Tally, WorkloadProfile};
pub use synth::{synthesize, ExpansionStrategy, GenerateOptions};

/// Outcome of [`generate_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateSummary {
    /// Valid records read from the source trace
    pub source_records: usize,
    /// Malformed source lines that were skipped
    pub skipped: usize,
    pub generated: usize,
    /// Seed actually used, for reproducing the run
    pub seed: u64,
}

/// Characterize `input` and write a synthetic trace to `output` in `to`.
///
/// `granularity` only affects MONITOR output.
pub fn generate_file(
    input: &Path,
    parser: &dyn TraceParser,
    output: &Path,
    to: TraceFormat,
    granularity: usize,
    options: &GenerateOptions,
) -> Result<GenerateSummary, GenerateError> {
    let entries = read_trace(input, parser)?;
    let mut records: Vec<OperationRecord> = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for entry in entries {
        match entry {
            Ok(record) => records.push(record),
            Err(malformed) => {
                tracing::warn!(line = malformed.line, reason = %malformed.reason, "Skipping malformed trace line");
                skipped += 1;
            }
        }
    }

    let profile = WorkloadProfile::characterize(&records, options.interval_pct)?;
    let seed = options.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let synthetic = synthesize(&profile, options, &mut rng)?;

    let mut writer = to.writer(output, granularity)?;
    for record in &synthetic {
        writer.append(record)?;
    }
    let generated = writer.finish()?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        seed,
        generated,
        "Wrote synthetic trace"
    );
    Ok(GenerateSummary {
        source_records: records.len(),
        skipped,
        generated,
        seed,
    })
}
