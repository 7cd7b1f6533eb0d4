pub mod backend;
pub mod config;
pub mod generate;
pub mod replay;
pub mod trace;
pub mod util;

pub use backend::{BackendConfig, BackendError, BackendKind, ExecutionStrategy, StrategyFactory};
pub use config::{Config, ConfigError};
pub use generate::{ExpansionStrategy, GenerateError, GenerateOptions, WorkloadProfile};
pub use replay::{LaneFailurePolicy, ReplayError, ReplayOptions, ReplayReport, Replayer, ReportMode};
pub use trace::{OperationRecord, TraceError, TraceFormat, TraceStats};
