//! Normalized JSON-lines traces.
//!
//! Each line holds one [`OperationRecord`]:
//!
//! ```text
//! {"timestamp":12.5,"op_type":"GET","target":"user:1","client_id":"c1","args":[]}
//! ```

use std::io;
use std::path::Path;

use crate::trace::parser::{TraceError, TraceFormat, TraceParser};
use crate::trace::record::{MalformedRecord, OperationRecord, TraceEntry};
use crate::trace::writer::{LineSink, TraceWriter};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonlParser;

impl TraceParser for JsonlParser {
    fn format(&self) -> TraceFormat {
        TraceFormat::Jsonl
    }

    fn parse_line(&self, line: usize, raw: &str) -> TraceEntry {
        let record: OperationRecord = serde_json::from_str(raw.trim())
            .map_err(|e| MalformedRecord::new(line, e.to_string()))?;
        if !record.sequence_timestamp.is_finite() {
            return Err(MalformedRecord::new(line, "timestamp is not finite"));
        }
        if record.operation_type.is_empty() {
            return Err(MalformedRecord::new(line, "empty op_type"));
        }
        Ok(record)
    }
}

/// Streaming writer for normalized traces.
pub struct JsonlWriter {
    sink: LineSink,
}

impl JsonlWriter {
    pub fn create(path: &Path) -> Result<Self, TraceError> {
        Ok(Self {
            sink: LineSink::create(path)?,
        })
    }
}

impl TraceWriter for JsonlWriter {
    fn format(&self) -> TraceFormat {
        TraceFormat::Jsonl
    }

    fn append(&mut self, record: &OperationRecord) -> Result<(), TraceError> {
        let json = serde_json::to_string(record).map_err(|e| self.sink.error(io::Error::other(e)))?;
        self.sink.write_line(&json)
    }

    fn finish(&mut self) -> Result<usize, TraceError> {
        self.sink.finish()
    }
}
