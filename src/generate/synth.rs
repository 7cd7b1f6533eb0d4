//! Synthesis of a new trace from a [`WorkloadProfile`].
//!
//! Time advances by gaps drawn from the current interval. At each step an
//! operation is drawn, then a target for that operation. Draws are filtered
//! against the set of keys that exist so far: reads and deletes of keys that
//! were never written are rejected and redrawn at the same instant.

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::generate::error::GenerateError;
use crate::generate::profile::{OpSemantics, WorkloadProfile};
use crate::trace::OperationRecord;

/// Consecutive draws without the clock moving before it is nudged forward
const MAX_STALLED_DRAWS: u32 = 1_024;
const STALL_STEP_MS: f64 = 1.0;

const VALUE_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&'()*+,-./:;<=>?@[]^_`{|}~";

/// How a target duration longer than the source trace is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionStrategy {
    /// Replay the source pattern over and over
    #[default]
    Cyclic,
    /// Slow the source pattern down to cover the whole duration once
    Stretch,
}

impl ExpansionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpansionStrategy::Cyclic => "cyclic",
            ExpansionStrategy::Stretch => "stretch",
        }
    }

    pub fn parse(s: &str) -> Result<Self, GenerateError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cyclic" => Ok(ExpansionStrategy::Cyclic),
            "stretch" | "expand" => Ok(ExpansionStrategy::Stretch),
            other => Err(GenerateError::UnknownStrategy(other.to_string())),
        }
    }

    /// Position in the source span, in percent, for `now_ms` of output.
    fn source_percent(&self, now_ms: f64, target_ms: f64, source_ms: f64) -> f64 {
        match self {
            ExpansionStrategy::Stretch if target_ms > source_ms => now_ms / target_ms * 100.0,
            _ => (now_ms % source_ms) / source_ms * 100.0,
        }
    }
}

impl std::fmt::Display for ExpansionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Length of the synthetic trace in seconds
    pub duration_secs: f64,
    /// Interval width used to characterize the source, in percent
    pub interval_pct: f64,
    pub strategy: ExpansionStrategy,
    /// Fixed RNG seed; a random one is picked and reported when absent
    pub seed: Option<u64>,
    /// Stop after this many records even if the duration is not reached
    pub max_records: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            duration_secs: 30.0,
            interval_pct: 5.0,
            strategy: ExpansionStrategy::Cyclic,
            seed: None,
            max_records: 1_000_000,
        }
    }
}

impl GenerateOptions {
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_interval(mut self, pct: f64) -> Self {
        self.interval_pct = pct;
        self
    }

    pub fn with_strategy(mut self, strategy: ExpansionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = max;
        self
    }
}

/// Generate records covering `options.duration_secs`, starting at time 0.
pub fn synthesize<R: Rng + ?Sized>(
    profile: &WorkloadProfile,
    options: &GenerateOptions,
    rng: &mut R,
) -> Result<Vec<OperationRecord>, GenerateError> {
    if !(options.duration_secs.is_finite() && options.duration_secs > 0.0) {
        return Err(GenerateError::InvalidDuration(options.duration_secs));
    }

    let target_ms = options.duration_secs * 1_000.0;
    let mut existing: BTreeSet<String> = BTreeSet::new();
    let mut records = Vec::new();
    let mut now_ms = 0.0;
    let mut stalled = 0u32;

    while now_ms < target_ms && records.len() < options.max_records {
        if stalled >= MAX_STALLED_DRAWS {
            now_ms += STALL_STEP_MS;
            stalled = 0;
            continue;
        }

        let percent = options
            .strategy
            .source_percent(now_ms, target_ms, profile.duration_ms);
        let Some(interval) = profile.interval_at(percent) else {
            break;
        };

        let operation = interval.operations.sample(rng);
        let Some(targets) = interval.targets.get(operation) else {
            stalled += 1;
            continue;
        };
        let target = targets.sample(rng);
        if !admit(OpSemantics::of(operation), target, &mut existing) {
            stalled += 1;
            continue;
        }

        let mut record = OperationRecord::new(now_ms / 1_000.0, operation.clone(), target.clone())
            .with_arguments(synthetic_arguments(operation, &existing, rng));
        if !profile.originators.is_empty() {
            let pick = rng.random_range(0..profile.originators.len());
            record = record.with_originator(profile.originators[pick].clone());
        }
        records.push(record);

        let gap_us = *interval.gaps_us.sample(rng);
        if gap_us == 0 {
            stalled += 1;
        } else {
            now_ms += gap_us as f64 / 1_000.0;
            stalled = 0;
        }
    }

    tracing::info!(
        records = records.len(),
        keys = existing.len(),
        strategy = %options.strategy,
        duration_secs = options.duration_secs,
        "Synthetic trace generated"
    );
    Ok(records)
}

/// Apply the key-existence rules and update `existing`.
///
/// Operations without a target are always admitted.
fn admit(semantics: OpSemantics, target: &str, existing: &mut BTreeSet<String>) -> bool {
    if target.is_empty() {
        return true;
    }
    match semantics {
        OpSemantics::Write => {
            if !existing.contains(target) {
                existing.insert(target.to_string());
            }
            true
        }
        OpSemantics::Read => existing.contains(target),
        OpSemantics::Delete => existing.remove(target),
    }
}

/// Fresh payload arguments for write operations.
fn synthetic_arguments<R: Rng + ?Sized>(
    operation: &str,
    existing: &BTreeSet<String>,
    rng: &mut R,
) -> Vec<String> {
    match operation.to_ascii_uppercase().as_str() {
        "HMSET" | "HSET" => {
            let fields = rng.random_range(1..=10);
            (0..fields)
                .flat_map(|j| [format!("field{j}"), random_value(50, rng)])
                .collect()
        }
        "SET" | "SETNX" | "APPEND" | "PUT" | "POST" | "PATCH" => vec![random_value(100, rng)],
        "ZADD" if !existing.is_empty() => {
            let score: f64 = rng.random_range(-1e9..1e9);
            let member = existing
                .iter()
                .nth(rng.random_range(0..existing.len()))
                .cloned()
                .unwrap_or_default();
            vec![format!("{score:.8E}"), member]
        }
        _ => Vec::new(),
    }
}

fn random_value<R: Rng + ?Sized>(len: usize, rng: &mut R) -> String {
    (0..len)
        .map(|_| VALUE_CHARS[rng.random_range(0..VALUE_CHARS.len())] as char)
        .collect()
}
