//! ToolWorker port - Contract for named external side effects.
//!
//! Workers receive resolved arguments and return a structured result.
//! Timeouts and retries are the executor's concern, not the worker's.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::foundation::{SessionId, ToolCallId};

/// A failed tool execution attempt.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ToolWorkerError {
    pub message: String,
}

impl ToolWorkerError {
    /// Creates a worker error from any displayable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Port for tool execution.
#[async_trait]
pub trait ToolWorker: Send + Sync {
    /// Executes the tool with fully resolved arguments.
    ///
    /// The `tool_call_id` correlates this execution with the `tool.call`
    /// event already emitted for it.
    async fn execute(
        &self,
        session_id: &SessionId,
        tool_call_id: &ToolCallId,
        args: &Value,
    ) -> Result<Value, ToolWorkerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn ToolWorker) {}

    #[test]
    fn worker_error_displays_message() {
        let err = ToolWorkerError::new("socket reset");
        assert_eq!(format!("{}", err), "socket reset");
    }
}
