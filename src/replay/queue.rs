use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::trace::OperationRecord;

/// An operation bound to the instant it should fire.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub fire_at: Instant,
    pub record: OperationRecord,
}

/// What travels down a lane queue.
///
/// `Shutdown` is the sentinel: it has no record, so it can never reach a
/// strategy.
#[derive(Debug, Clone)]
pub enum LaneMessage {
    Task(ScheduledTask),
    Shutdown,
}

/// The consuming lane has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("lane {0} is no longer accepting work")]
pub struct QueueClosed(pub usize);

/// Create the unbounded FIFO feeding lane `lane`.
pub fn lane_queue(lane: usize) -> (LaneSender, LaneReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LaneSender { lane, tx }, LaneReceiver { lane, rx })
}

/// Producer half. Pushes never block.
#[derive(Debug, Clone)]
pub struct LaneSender {
    lane: usize,
    tx: mpsc::UnboundedSender<LaneMessage>,
}

impl LaneSender {
    pub fn lane(&self) -> usize {
        self.lane
    }

    /// Make `message` visible to the lane, waking it if it is waiting.
    pub fn push(&self, message: LaneMessage) -> Result<(), QueueClosed> {
        self.tx.send(message).map_err(|_| QueueClosed(self.lane))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, owned by exactly one lane.
#[derive(Debug)]
pub struct LaneReceiver {
    lane: usize,
    rx: mpsc::UnboundedReceiver<LaneMessage>,
}

impl LaneReceiver {
    pub fn lane(&self) -> usize {
        self.lane
    }

    /// Wait for the next message in arrival order.
    ///
    /// Returns `None` once every sender is gone and the queue is empty.
    pub async fn pop(&mut self) -> Option<LaneMessage> {
        self.rx.recv().await
    }

    /// Take the next message if one is already queued.
    pub fn try_pop(&mut self) -> Option<LaneMessage> {
        self.rx.try_recv().ok()
    }
}
