//! Trace fixtures
//!
//! Builds traces either as in-memory entries for `Replayer::run` or as files
//! in a temporary directory for `run_file` and the CLI.

use std::path::PathBuf;

use tempfile::TempDir;
use tracereplay::trace::{
    JsonlWriter, MalformedRecord, OperationRecord, TraceEntry, TraceWriter,
};

/// A trace file that lives as long as this value
pub struct TraceFile {
    /// TempDir handle (keeps directory alive until dropped)
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TraceFile {
    /// Write raw MONITOR lines, one per element
    pub fn monitor(lines: &[String]) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("trace.log");
        let mut contents = lines.join("\n");
        contents.push('\n');
        std::fs::write(&path, contents).expect("Failed to write trace");
        Self { dir, path }
    }

    /// Write raw bytes, for captures that are not clean UTF-8
    pub fn raw(name: &str, bytes: &[u8]) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).expect("Failed to write trace");
        Self { dir, path }
    }

    /// Write records as JSON lines
    pub fn jsonl(records: &[OperationRecord]) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("trace.jsonl");
        let mut writer = JsonlWriter::create(&path).expect("Failed to create trace");
        for record in records {
            writer.append(record).expect("Failed to append record");
        }
        writer.finish().expect("Failed to flush trace");
        Self { dir, path }
    }
}

/// One `redis-cli MONITOR` line
pub fn monitor_line(ts: f64, op: &str, args: &[&str]) -> String {
    let quoted: Vec<String> = std::iter::once(op)
        .chain(args.iter().copied())
        .map(|a| format!("\"{a}\""))
        .collect();
    format!("{ts:.6} [0 127.0.0.1:52144] {}", quoted.join(" "))
}

/// `GET k<i>` records at the given timestamps
pub fn gets(timestamps: &[f64]) -> Vec<TraceEntry> {
    timestamps
        .iter()
        .enumerate()
        .map(|(i, ts)| Ok(OperationRecord::new(*ts, "GET", format!("k{i}"))))
        .collect()
}

/// `n` records spaced `step` seconds apart
pub fn evenly_spaced(n: usize, step: f64) -> Vec<TraceEntry> {
    let timestamps: Vec<f64> = (0..n).map(|i| i as f64 * step).collect();
    gets(&timestamps)
}

pub fn malformed(line: usize) -> TraceEntry {
    Err(MalformedRecord::new(line, "garbage"))
}

/// Target keys in execution order
pub fn keys(records: &[OperationRecord]) -> Vec<String> {
    records.iter().map(|r| r.target_key.clone()).collect()
}
