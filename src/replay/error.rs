use thiserror::Error;

use crate::trace::TraceError;

/// Errors that stop a replay from completing.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("lane count must be at least 1")]
    NoLanes,

    #[error("lane {lane} failed to set up: {reason}")]
    LaneSetup { lane: usize, reason: String },

    #[error("every lane failed to set up; nothing to replay on")]
    NoLiveLanes,

    #[error("lane {0} thread panicked")]
    LanePanicked(usize),

    #[error(transparent)]
    Trace(#[from] TraceError),
}
