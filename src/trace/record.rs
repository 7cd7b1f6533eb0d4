use serde::{Deserialize, Serialize};

/// One normalized trace event.
///
/// Records are produced by a [`TraceParser`](crate::trace::TraceParser) and are
/// never mutated afterwards; the dispatcher moves them into a lane queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Trace-relative timestamp in seconds
    #[serde(rename = "timestamp")]
    pub sequence_timestamp: f64,
    /// Backend operation, e.g. "GET" or "POST"
    #[serde(rename = "op_type")]
    pub operation_type: String,
    /// Key or path the operation targets
    #[serde(rename = "target")]
    pub target_key: String,
    /// Client that issued the operation in the captured run
    #[serde(rename = "client_id", default)]
    pub originator_id: String,
    /// Remaining arguments in original order
    #[serde(rename = "args", default)]
    pub arguments: Vec<String>,
}

impl OperationRecord {
    pub fn new(
        sequence_timestamp: f64,
        operation_type: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            sequence_timestamp,
            operation_type: operation_type.into(),
            target_key: target_key.into(),
            originator_id: String::new(),
            arguments: Vec::new(),
        }
    }

    pub fn with_originator(mut self, originator_id: impl Into<String>) -> Self {
        self.originator_id = originator_id.into();
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }
}

/// A trace line that could not be turned into an [`OperationRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed trace line {line}: {reason}")]
pub struct MalformedRecord {
    /// 1-based line number in the trace source
    pub line: usize,
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Parsed trace entry as handed to the dispatcher.
pub type TraceEntry = Result<OperationRecord, MalformedRecord>;
