//! Parser for `redis-cli MONITOR` captures.
//!
//! A capture line looks like:
//!
//! ```text
//! 1700000000.123456 [0 127.0.0.1:52144] "HMSET" "user:1" "name" "ada"
//! ```
//!
//! Argument contents are kept raw. An argument only ends at a quote that is
//! followed by the end of the line or by whitespace and the next opening quote,
//! so values with embedded quotes survive.
//!
//! [`MonitorWriter`] produces the same layout, so normalized or synthetic
//! traces can be fed to tools that expect a raw capture.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::trace::parser::{TraceError, TraceFormat, TraceParser};
use crate::trace::record::{MalformedRecord, OperationRecord, TraceEntry};
use crate::trace::writer::{LineSink, TraceWriter};

fn line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\S+)\s+\[([^\]]+)\]\s+(.*)$").expect("monitor line pattern is valid")
    })
}

/// Commands the server emits for connection bookkeeping; they carry no load.
const IGNORED_COMMANDS: &[&str] = &["CLIENT"];

#[derive(Debug, Clone, Default)]
pub struct MonitorParser;

impl MonitorParser {
    pub fn new() -> Self {
        Self
    }
}

impl TraceParser for MonitorParser {
    fn format(&self) -> TraceFormat {
        TraceFormat::Monitor
    }

    fn parse_line(&self, line: usize, raw: &str) -> TraceEntry {
        let caps = line_regex()
            .captures(raw.trim())
            .ok_or_else(|| MalformedRecord::new(line, "not a MONITOR line"))?;

        let timestamp: f64 = caps[1]
            .parse()
            .map_err(|_| MalformedRecord::new(line, format!("bad timestamp '{}'", &caps[1])))?;
        if !timestamp.is_finite() {
            return Err(MalformedRecord::new(line, "timestamp is not finite"));
        }

        let args = split_quoted_args(&caps[3])
            .ok_or_else(|| MalformedRecord::new(line, "unterminated quoted argument"))?;
        let mut args = args.into_iter();
        let operation = args
            .next()
            .ok_or_else(|| MalformedRecord::new(line, "no command"))?
            .to_ascii_uppercase();

        if IGNORED_COMMANDS.contains(&operation.as_str()) {
            return Err(MalformedRecord::new(
                line,
                format!("{operation} is a bookkeeping command"),
            ));
        }

        let target = args.next().unwrap_or_default();
        Ok(OperationRecord::new(timestamp, operation, target)
            .with_originator(&caps[2])
            .with_arguments(args.collect()))
    }
}

/// Client field used when a record has no originator
const UNKNOWN_ORIGINATOR: &str = "0 unknown";

/// Render `record` as one MONITOR line with `granularity` decimal places.
///
/// The target is always written, even when empty, and arguments are quoted
/// without escaping.
pub fn format_monitor_line(record: &OperationRecord, granularity: usize) -> String {
    let originator = if record.originator_id.is_empty() {
        UNKNOWN_ORIGINATOR
    } else {
        &record.originator_id
    };

    let mut line = format!(
        "{:.*} [{}] \"{}\" \"{}\"",
        granularity, record.sequence_timestamp, originator, record.operation_type, record.target_key
    );
    for arg in &record.arguments {
        line.push_str(" \"");
        line.push_str(arg);
        line.push('"');
    }
    line
}

/// Writes records as `redis-cli MONITOR` lines.
pub struct MonitorWriter {
    sink: LineSink,
    granularity: usize,
}

impl MonitorWriter {
    pub fn create(path: &Path, granularity: usize) -> Result<Self, TraceError> {
        Ok(Self {
            sink: LineSink::create(path)?,
            granularity,
        })
    }
}

impl TraceWriter for MonitorWriter {
    fn format(&self) -> TraceFormat {
        TraceFormat::Monitor
    }

    fn append(&mut self, record: &OperationRecord) -> Result<(), TraceError> {
        self.sink
            .write_line(&format_monitor_line(record, self.granularity))
    }

    fn finish(&mut self) -> Result<usize, TraceError> {
        self.sink.finish()
    }
}

/// Split `"a" "b c" "d"` into raw argument strings.
///
/// Returns `None` when the last argument is never closed.
fn split_quoted_args(input: &str) -> Option<Vec<String>> {
    let chars: Vec<char> = input.chars().collect();
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for (i, &c) in chars.iter().enumerate() {
        if !in_quotes {
            if c == '"' {
                in_quotes = true;
            }
            continue;
        }

        if c == '"' && closes_argument(&chars, i) {
            in_quotes = false;
            args.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }

    if in_quotes {
        return None;
    }
    Some(args)
}

fn closes_argument(chars: &[char], quote_at: usize) -> bool {
    let rest = &chars[quote_at + 1..];
    match rest.first() {
        None => true,
        Some(c) if c.is_whitespace() => rest
            .iter()
            .find(|c| !c.is_whitespace())
            .map_or(true, |c| *c == '"'),
        Some(_) => false,
    }
}
