/// Errors raised by execution strategies.
///
/// The replay engine never propagates these past a lane: setup errors mark
/// the lane as failed and execution errors become failed outcomes.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("unknown backend '{0}' (expected one of: redis, http, noop)")]
    UnknownBackend(String),

    #[error("backend configuration error: {0}")]
    Config(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("strategy used before connect")]
    NotConnected,

    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    #[error("invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{target} returned HTTP {status}")]
    HttpStatus { status: u16, target: String },

    #[error("simulated failure: {0}")]
    Simulated(String),
}

impl BackendError {
    pub(crate) fn invalid(operation: &str, reason: impl Into<String>) -> Self {
        BackendError::InvalidArguments {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}
