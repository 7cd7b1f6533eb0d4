//! The timed replay engine.
//!
//! A [`Dispatcher`] turns trace entries into [`ScheduledTask`]s and deals
//! them round-robin onto per-lane queues. Each lane runs on its own thread,
//! sleeps until a task's fire time, executes it through its own
//! [`ExecutionStrategy`](crate::backend::ExecutionStrategy) and records the
//! outcome in a shared [`Aggregator`]. [`Replayer`] wires it all together.

pub mod aggregator;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod lane;
pub mod queue;
pub mod report;

pub use aggregator::{Aggregator, ExecutionOutcome, ReportMode};
pub use dispatcher::{offset_nanos, DispatchSummary, Dispatcher};
pub use engine::{LaneFailurePolicy, ReplayOptions, Replayer};
pub use error::ReplayError;
pub use lane::{spawn_lane, LaneHandle, LaneReport, LaneState, WorkerLane};
pub use queue::{lane_queue, LaneMessage, LaneReceiver, LaneSender, QueueClosed, ScheduledTask};
pub use report::{percentile, LatencySummary, OutcomeSummary, ReplayReport};
