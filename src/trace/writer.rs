//! Writing traces back out, and format conversion.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::trace::parser::{read_trace, TraceError, TraceFormat, TraceParser};
use crate::trace::record::OperationRecord;

/// Decimal places of MONITOR timestamps, i.e. microseconds
pub const DEFAULT_GRANULARITY: usize = 6;

/// Sink for normalized records in one on-disk format.
pub trait TraceWriter {
    fn format(&self) -> TraceFormat;

    fn append(&mut self, record: &OperationRecord) -> Result<(), TraceError>;

    /// Flush buffered output and return the number of records written.
    fn finish(&mut self) -> Result<usize, TraceError>;
}

/// Buffered line output shared by the writers.
pub(crate) struct LineSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl LineSink {
    pub(crate) fn create(path: &Path) -> Result<Self, TraceError> {
        let file = File::create(path).map_err(|source| TraceError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub(crate) fn write_line(&mut self, line: &str) -> Result<(), TraceError> {
        writeln!(self.writer, "{line}").map_err(|e| self.error(e))?;
        self.written += 1;
        Ok(())
    }

    pub(crate) fn finish(&mut self) -> Result<usize, TraceError> {
        self.writer.flush().map_err(|e| self.error(e))?;
        Ok(self.written)
    }

    pub(crate) fn error(&self, source: io::Error) -> TraceError {
        TraceError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

/// Outcome of a trace conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertSummary {
    pub written: usize,
    pub skipped: usize,
}

/// Re-encode `input` (read with `parser`) as `to` at `output`.
///
/// Malformed lines are skipped with a warning, matching replay behavior.
/// `granularity` only affects MONITOR output.
pub fn convert(
    input: &Path,
    parser: &dyn TraceParser,
    output: &Path,
    to: TraceFormat,
    granularity: usize,
) -> Result<ConvertSummary, TraceError> {
    let entries = read_trace(input, parser)?;
    let mut writer = to.writer(output, granularity)?;
    let mut skipped = 0;

    for entry in entries {
        match entry {
            Ok(record) => writer.append(&record)?,
            Err(malformed) => {
                tracing::warn!(line = malformed.line, reason = %malformed.reason, "Skipping malformed trace line");
                skipped += 1;
            }
        }
    }

    let written = writer.finish()?;
    tracing::debug!(
        input = %input.display(),
        output = %output.display(),
        from = %parser.format(),
        to = %writer.format(),
        written,
        skipped,
        "Trace converted"
    );
    Ok(ConvertSummary { written, skipped })
}
