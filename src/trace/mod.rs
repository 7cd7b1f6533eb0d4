//! Trace ingestion and output: normalized records, the per-format parsers
//! and writers, and trace statistics.

pub mod jsonl;
pub mod monitor;
pub mod parser;
pub mod record;
pub mod stats;
pub mod writer;

pub use jsonl::{JsonlParser, JsonlWriter};
pub use monitor::{format_monitor_line, MonitorParser, MonitorWriter};
pub use parser::{read_trace, TraceError, TraceFormat, TraceParser};
pub use record::{MalformedRecord, OperationRecord, TraceEntry};
pub use stats::{CommandShare, InterArrivalStats, TraceStats};
pub use writer::{convert, ConvertSummary, TraceWriter, DEFAULT_GRANULARITY};
