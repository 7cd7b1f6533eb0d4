use async_trait::async_trait;

use crate::backend::error::BackendError;
use crate::backend::strategy::{BackendKind, ExecutionStrategy};
use crate::trace::OperationRecord;

/// Dry-run backend: every operation succeeds immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStrategy;

#[async_trait]
impl ExecutionStrategy for NoopStrategy {
    fn backend(&self) -> BackendKind {
        BackendKind::Noop
    }

    async fn connect(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn execute(&mut self, _record: &OperationRecord) -> Result<(), BackendError> {
        Ok(())
    }
}
