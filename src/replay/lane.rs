//! Worker lanes: one OS thread, one backend connection, one queue each.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::backend::{BackendError, ExecutionStrategy, StrategyFactory};
use crate::replay::aggregator::{Aggregator, ExecutionOutcome};
use crate::replay::error::ReplayError;
use crate::replay::queue::{LaneMessage, LaneReceiver, ScheduledTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    Connecting,
    Ready,
    Waiting,
    Executing,
    Drained,
}

/// What a lane reports once its thread has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneReport {
    pub lane: usize,
    pub executed: u64,
    /// Set when the lane never got past connect
    pub setup_error: Option<String>,
}

impl LaneReport {
    fn failed(lane: usize, reason: String) -> Self {
        Self {
            lane,
            executed: 0,
            setup_error: Some(reason),
        }
    }
}

pub struct WorkerLane {
    id: usize,
    strategy: Box<dyn ExecutionStrategy>,
    queue: LaneReceiver,
    aggregator: Arc<Aggregator>,
    state: LaneState,
    executed: u64,
}

impl WorkerLane {
    pub fn new(
        id: usize,
        strategy: Box<dyn ExecutionStrategy>,
        queue: LaneReceiver,
        aggregator: Arc<Aggregator>,
    ) -> Self {
        Self {
            id,
            strategy,
            queue,
            aggregator,
            state: LaneState::Connecting,
            executed: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> LaneState {
        self.state
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Open the lane's backend connection. A failure leaves the lane drained.
    pub async fn connect(&mut self) -> Result<(), BackendError> {
        self.state = LaneState::Connecting;
        match self.strategy.connect().await {
            Ok(()) => {
                self.state = LaneState::Ready;
                tracing::debug!(lane = self.id, backend = %self.strategy.backend(), "Lane connected");
                Ok(())
            }
            Err(err) => {
                self.state = LaneState::Drained;
                tracing::error!(lane = self.id, error = %err, "Lane setup failed");
                Err(err)
            }
        }
    }

    /// Execute queued tasks in order until the shutdown sentinel arrives.
    ///
    /// The lane sits in `Ready` while the queue is empty, moves to `Waiting`
    /// until a task's fire time, then `Executing`, and back to `Ready`.
    pub async fn drain(&mut self) -> u64 {
        loop {
            self.state = LaneState::Ready;
            match self.queue.pop().await {
                Some(LaneMessage::Task(task)) => self.run_task(task).await,
                Some(LaneMessage::Shutdown) => break,
                None => {
                    tracing::warn!(lane = self.id, "Lane queue closed without shutdown");
                    break;
                }
            }
        }
        self.state = LaneState::Drained;
        tracing::debug!(lane = self.id, executed = self.executed, "Lane drained");
        self.executed
    }

    async fn run_task(&mut self, task: ScheduledTask) {
        self.state = LaneState::Waiting;
        tokio::time::sleep_until(task.fire_at).await;

        self.state = LaneState::Executing;
        let started = Instant::now();
        let result = AssertUnwindSafe(self.strategy.execute(&task.record))
            .catch_unwind()
            .await;
        let latency = started.elapsed();

        let outcome = match result {
            Ok(Ok(())) => ExecutionOutcome::success(latency),
            Ok(Err(err)) => {
                tracing::debug!(
                    lane = self.id,
                    op = %task.record.operation_type,
                    key = %task.record.target_key,
                    error = %err,
                    "Operation failed"
                );
                ExecutionOutcome::failure()
            }
            Err(_) => {
                tracing::warn!(
                    lane = self.id,
                    op = %task.record.operation_type,
                    "Strategy panicked during execute"
                );
                ExecutionOutcome::failure()
            }
        };
        self.aggregator.record(outcome);
        self.executed += 1;
        self.state = LaneState::Ready;
    }

    /// Connect, signal readiness, then drain.
    pub async fn run(mut self, ready: oneshot::Sender<Result<(), String>>) -> LaneReport {
        if let Err(err) = self.connect().await {
            let reason = err.to_string();
            let _ = ready.send(Err(reason.clone()));
            return LaneReport::failed(self.id, reason);
        }
        let _ = ready.send(Ok(()));

        let executed = self.drain().await;
        LaneReport {
            lane: self.id,
            executed,
            setup_error: None,
        }
    }
}

/// Handle to a lane running on its own thread.
pub struct LaneHandle {
    lane: usize,
    ready: Option<oneshot::Receiver<Result<(), String>>>,
    thread: JoinHandle<LaneReport>,
}

impl LaneHandle {
    pub fn lane(&self) -> usize {
        self.lane
    }

    /// Wait until the lane has connected, or learn why it could not.
    pub async fn wait_ready(&mut self) -> Result<(), String> {
        match self.ready.take() {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err("lane exited before reporting readiness".to_string())),
            None => Ok(()),
        }
    }

    /// Block (off the async runtime) until the lane thread exits.
    pub async fn join(self) -> Result<LaneReport, ReplayError> {
        let lane = self.lane;
        let thread = self.thread;
        tokio::task::spawn_blocking(move || thread.join())
            .await
            .map_err(|_| ReplayError::LanePanicked(lane))?
            .map_err(|_| ReplayError::LanePanicked(lane))
    }
}

/// Start lane `id` on a dedicated thread with its own single-threaded runtime.
///
/// The strategy is created and connected inside the thread so that no
/// connection state is ever shared between lanes.
pub fn spawn_lane(
    id: usize,
    factory: Arc<dyn StrategyFactory>,
    queue: LaneReceiver,
    aggregator: Arc<Aggregator>,
) -> Result<LaneHandle, ReplayError> {
    let (ready_tx, ready_rx) = oneshot::channel();

    let thread = thread::Builder::new()
        .name(format!("lane-{id}"))
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(err) => {
                    let reason = format!("failed to build runtime: {err}");
                    let _ = ready_tx.send(Err(reason.clone()));
                    return LaneReport::failed(id, reason);
                }
            };

            runtime.block_on(async move {
                let strategy = match factory.create(id) {
                    Ok(strategy) => strategy,
                    Err(err) => {
                        tracing::error!(lane = id, error = %err, "Failed to create strategy");
                        let reason = err.to_string();
                        let _ = ready_tx.send(Err(reason.clone()));
                        return LaneReport::failed(id, reason);
                    }
                };
                WorkerLane::new(id, strategy, queue, aggregator)
                    .run(ready_tx)
                    .await
            })
        })
        .map_err(|err| ReplayError::LaneSetup {
            lane: id,
            reason: err.to_string(),
        })?;

    Ok(LaneHandle {
        lane: id,
        ready: Some(ready_rx),
        thread,
    })
}
