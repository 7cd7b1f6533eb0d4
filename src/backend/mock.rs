//! Mock execution strategy for deterministic testing
//!
//! Implements the strategy traits without touching a real backend and
//! captures every executed record per lane, so replay tests can assert on
//! ordering, pacing and failure handling.
//!
//! # Example
//! ```no_run
//! use tracereplay::backend::mock::{MockConfig, MockStrategyFactory};
//!
//! let factory = MockStrategyFactory::new(MockConfig::default().failing_connect(1));
//! // Hand `factory` to a Replayer, then inspect `factory.executed_on(0)`.
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::backend::error::BackendError;
use crate::backend::strategy::{BackendKind, ExecutionStrategy, StrategyFactory};
use crate::trace::OperationRecord;

/// Configuration for mock strategy behavior
#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    /// Lanes whose connect() fails
    pub fail_connect_lanes: Vec<usize>,
    /// Lanes whose connect() panics
    pub panic_connect_lanes: Vec<usize>,
    /// Whether every execute() fails
    pub fail_all: bool,
    /// Operation types whose execute() fails
    pub fail_operations: Vec<String>,
    /// Whether execute() panics instead of returning
    pub panic_on_execute: bool,
    /// Simulated backend latency per operation
    pub latency: Duration,
}

impl MockConfig {
    /// Make connect() fail on the given lane
    pub fn failing_connect(mut self, lane: usize) -> Self {
        self.fail_connect_lanes.push(lane);
        self
    }

    /// Make connect() panic on the given lane
    pub fn panicking_connect(mut self, lane: usize) -> Self {
        self.panic_connect_lanes.push(lane);
        self
    }

    /// Make every execute() fail
    pub fn failing_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Make execute() fail for one operation type
    pub fn failing_operation(mut self, op: impl Into<String>) -> Self {
        self.fail_operations.push(op.into());
        self
    }

    /// Make execute() panic
    pub fn panicking(mut self) -> Self {
        self.panic_on_execute = true;
        self
    }

    /// Configure simulated latency (default: Duration::ZERO)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// A record as seen by the mock backend.
#[derive(Clone, Debug)]
pub struct ExecutedRecord {
    pub lane: usize,
    pub record: OperationRecord,
    /// When execute() was entered
    pub at: Instant,
    pub success: bool,
}

/// Factory handing out [`MockStrategy`] instances that share one capture log.
#[derive(Clone, Default)]
pub struct MockStrategyFactory {
    config: MockConfig,
    executed: Arc<Mutex<Vec<ExecutedRecord>>>,
    created: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
}

impl MockStrategyFactory {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Every executed record across all lanes, in capture order
    pub fn executed(&self) -> Vec<ExecutedRecord> {
        self.executed.lock().clone()
    }

    /// Records executed by one lane, in execution order
    pub fn executed_on(&self, lane: usize) -> Vec<OperationRecord> {
        self.executed
            .lock()
            .iter()
            .filter(|e| e.lane == lane)
            .map(|e| e.record.clone())
            .collect()
    }

    /// Number of strategy instances created
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of connect() calls, successful or not
    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl StrategyFactory for MockStrategyFactory {
    fn backend(&self) -> BackendKind {
        BackendKind::Noop
    }

    fn create(&self, lane: usize) -> Result<Box<dyn ExecutionStrategy>, BackendError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStrategy {
            lane,
            config: self.config.clone(),
            executed: self.executed.clone(),
            connects: self.connects.clone(),
            connected: false,
        }))
    }
}

/// Mock strategy for one lane
pub struct MockStrategy {
    lane: usize,
    config: MockConfig,
    executed: Arc<Mutex<Vec<ExecutedRecord>>>,
    connects: Arc<AtomicUsize>,
    connected: bool,
}

#[async_trait]
impl ExecutionStrategy for MockStrategy {
    fn backend(&self) -> BackendKind {
        BackendKind::Noop
    }

    async fn connect(&mut self) -> Result<(), BackendError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.config.panic_connect_lanes.contains(&self.lane) {
            panic!("mock connect panic on lane {}", self.lane);
        }
        if self.config.fail_connect_lanes.contains(&self.lane) {
            return Err(BackendError::Connection(format!(
                "mock-failure on lane {}",
                self.lane
            )));
        }
        self.connected = true;
        Ok(())
    }

    async fn execute(&mut self, record: &OperationRecord) -> Result<(), BackendError> {
        if !self.connected {
            return Err(BackendError::NotConnected);
        }
        let at = Instant::now();

        if self.config.latency > Duration::ZERO {
            tokio::time::sleep(self.config.latency).await;
        }

        let fails = self.config.fail_all
            || self
                .config
                .fail_operations
                .iter()
                .any(|op| op == &record.operation_type);

        self.executed.lock().push(ExecutedRecord {
            lane: self.lane,
            record: record.clone(),
            at,
            success: !fails && !self.config.panic_on_execute,
        });

        if self.config.panic_on_execute {
            panic!("mock panic on {}", record.operation_type);
        }
        if fails {
            return Err(BackendError::Simulated(format!(
                "{} {}",
                record.operation_type, record.target_key
            )));
        }
        Ok(())
    }
}
