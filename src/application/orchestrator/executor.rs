//! Tool registry and execution.
//!
//! The registry is a process-wide, read-mostly mapping mutated only at
//! startup. Execution races the worker against the tool's timeout; the
//! safe wrapper retries a bounded number of times with a fixed delay and
//! only the final failure propagates as `tool.error`. Retries never
//! re-emit `tool.call`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;

use crate::domain::foundation::{SessionId, ToolCallId};
use crate::domain::session::{SessionEvent, ToolCallRecord};
use crate::ports::{StoreError, ToolWorker, ToolWorkerError};

use super::{EngineError, Orchestrator};

/// How long the completion task keeps retrying lock acquisition before
/// giving up on delivering a result.
const REENTRY_ATTEMPTS: u32 = 50;
const REENTRY_DELAY: Duration = Duration::from_millis(100);

/// Bounded retry for tool workers.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Process-wide mapping from tool name to worker.
pub struct ToolRegistry {
    workers: RwLock<HashMap<String, Arc<dyn ToolWorker>>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            workers: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a worker under a tool name. Called at startup only.
    pub fn register(&self, name: impl Into<String>, worker: Arc<dyn ToolWorker>) {
        self.workers
            .write()
            .expect("tool registry lock poisoned")
            .insert(name.into(), worker);
    }

    /// Looks up the worker for a tool name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolWorker>> {
        self.workers
            .read()
            .expect("tool registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Registered tool names, for diagnostics.
    pub fn names(&self) -> Vec<String> {
        self.workers
            .read()
            .expect("tool registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the worker in the background and feeds the outcome back into the
/// orchestrator. `tool.call` has already been emitted by the caller.
pub(super) fn spawn_tool_task(
    orchestrator: Arc<Orchestrator>,
    session_id: SessionId,
    record: ToolCallRecord,
    timeout: Duration,
    retry: RetryPolicy,
) {
    tokio::spawn(async move {
        let Some(worker) = orchestrator.tools.get(&record.name) else {
            emit_tool_error(
                &orchestrator,
                &session_id,
                record.id,
                format!("no worker registered for tool '{}'", record.name),
            )
            .await;
            return;
        };

        let attempt = run_with_retry(worker, &session_id, &record.id, &record.args, &retry);
        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(result)) => {
                deliver_result(&orchestrator, &session_id, record.id, result).await;
            }
            Ok(Err(e)) => {
                emit_tool_error(&orchestrator, &session_id, record.id, e.message).await;
            }
            Err(_) => {
                emit_tool_error(
                    &orchestrator,
                    &session_id,
                    record.id,
                    format!("tool '{}' timed out after {:?}", record.name, timeout),
                )
                .await;
            }
        }
    });
}

async fn run_with_retry(
    worker: Arc<dyn ToolWorker>,
    session_id: &SessionId,
    tool_call_id: &ToolCallId,
    args: &Value,
    retry: &RetryPolicy,
) -> Result<Value, ToolWorkerError> {
    let attempts = retry.attempts.max(1);
    let mut last_error = None;
    for attempt in 1..=attempts {
        match worker.execute(session_id, tool_call_id, args).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                tracing::warn!(
                    %session_id,
                    %tool_call_id,
                    attempt,
                    error = %e,
                    "Tool attempt failed"
                );
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(retry.delay).await;
                }
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ToolWorkerError::new("tool failed")))
}

/// Re-enters the orchestrator under a fresh lock. The dispatching step
/// may still hold the lock when a fast worker completes, so contention
/// here is expected and retried briefly.
async fn deliver_result(
    orchestrator: &Arc<Orchestrator>,
    session_id: &SessionId,
    tool_call_id: ToolCallId,
    result: Value,
) {
    for _ in 0..REENTRY_ATTEMPTS {
        match orchestrator
            .process_tool_result(session_id, tool_call_id, result.clone())
            .await
        {
            Ok(()) => return,
            Err(EngineError::Store(StoreError::LockHeld(_))) => {
                tokio::time::sleep(REENTRY_DELAY).await;
            }
            Err(e) => {
                tracing::warn!(%session_id, %tool_call_id, error = %e, "Failed to process tool result");
                return;
            }
        }
    }
    tracing::warn!(%session_id, %tool_call_id, "Gave up delivering tool result; session lock never freed");
}

async fn emit_tool_error(
    orchestrator: &Arc<Orchestrator>,
    session_id: &SessionId,
    tool_call_id: ToolCallId,
    error: String,
) {
    if let Err(e) = orchestrator
        .store
        .emit(
            session_id,
            SessionEvent::ToolError {
                tool_call_id,
                error,
            },
        )
        .await
    {
        tracing::warn!(%session_id, %tool_call_id, error = %e, "Failed to emit tool.error");
    }
}
