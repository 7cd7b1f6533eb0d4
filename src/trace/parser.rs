use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::trace::jsonl::{JsonlParser, JsonlWriter};
use crate::trace::monitor::{MonitorParser, MonitorWriter};
use crate::trace::record::{MalformedRecord, TraceEntry};
use crate::trace::writer::TraceWriter;

/// Errors that prevent a trace from being read at all.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("failed to read trace {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write trace {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown trace format '{0}' (expected one of: monitor, jsonl)")]
    UnknownFormat(String),
}

/// On-disk trace layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceFormat {
    /// Raw `redis-cli MONITOR` output
    #[default]
    Monitor,
    /// One normalized record per line as JSON
    Jsonl,
}

impl TraceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceFormat::Monitor => "monitor",
            TraceFormat::Jsonl => "jsonl",
        }
    }

    pub fn parse(s: &str) -> Result<Self, TraceError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monitor" => Ok(TraceFormat::Monitor),
            "jsonl" | "json" => Ok(TraceFormat::Jsonl),
            other => Err(TraceError::UnknownFormat(other.to_string())),
        }
    }

    /// Build the parser for this format.
    pub fn parser(&self) -> Box<dyn TraceParser> {
        match self {
            TraceFormat::Monitor => Box::new(MonitorParser::new()),
            TraceFormat::Jsonl => Box::new(JsonlParser),
        }
    }

    /// Create a writer for this format at `path`. `granularity` is the number
    /// of timestamp decimals in MONITOR output.
    pub fn writer(
        &self,
        path: &Path,
        granularity: usize,
    ) -> Result<Box<dyn TraceWriter>, TraceError> {
        Ok(match self {
            TraceFormat::Monitor => Box::new(MonitorWriter::create(path, granularity)?),
            TraceFormat::Jsonl => Box::new(JsonlWriter::create(path)?),
        })
    }
}

impl std::fmt::Display for TraceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns one line of a captured trace into a normalized record.
///
/// Implementations are pure: no shared state, one call per line.
pub trait TraceParser: Send + Sync {
    fn format(&self) -> TraceFormat;

    /// Parse a single non-blank line. `line` is the 1-based position in the
    /// source and is carried into the malformed indicator.
    fn parse_line(&self, line: usize, raw: &str) -> TraceEntry;
}

/// Read every non-blank line of `path` through `parser`, in file order.
///
/// Malformed lines, including lines that are not valid UTF-8, are returned as
/// `Err` entries rather than failing the read; only I/O errors are fatal.
pub fn read_trace(path: &Path, parser: &dyn TraceParser) -> Result<Vec<TraceEntry>, TraceError> {
    let read_error = |source: io::Error| TraceError::Read {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(read_error)?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    for (idx, bytes) in reader.split(b'\n').enumerate() {
        let mut bytes = bytes.map_err(read_error)?;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(_) => {
                entries.push(Err(MalformedRecord::new(idx + 1, "invalid UTF-8")));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        entries.push(parser.parse_line(idx + 1, &line));
    }

    tracing::debug!(
        path = %path.display(),
        format = %parser.format(),
        entries = entries.len(),
        "Trace loaded"
    );
    Ok(entries)
}
