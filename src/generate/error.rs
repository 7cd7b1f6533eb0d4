use thiserror::Error;

use crate::trace::TraceError;

/// Errors from building a workload profile or synthesizing from it.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("need at least 2 records to characterize a workload, got {0}")]
    TooFewRecords(usize),

    #[error("interval must be within (0, 100] percent, got {0}")]
    InvalidInterval(f64),

    #[error("duration must be a positive number of seconds, got {0}")]
    InvalidDuration(f64),

    #[error("unknown expansion strategy '{0}' (expected one of: cyclic, stretch)")]
    UnknownStrategy(String),

    #[error("invalid workload profile: {0}")]
    Profile(String),

    #[error(transparent)]
    Trace(#[from] TraceError),
}
