//! SessionStore port - Per-session persistence, locking, event log, pub/sub.
//!
//! One session `S` owns five records in the backing store:
//!
//! - `state:S` - serialized [`SessionState`]
//! - `flow:S` - serialized [`FlowConfig`], immutable for the session's lifetime
//! - `seq:S` - monotonic event counter
//! - `stream:S` - ordered event log (append + range-read by sequence)
//! - `lock:S` - distributed lock key
//!
//! and the live topic `pub:S`. The combination of a durable log and a
//! real-time topic lets late subscribers catch up by range-reading while
//! live subscribers see updates immediately; de-duplicating by `seq`
//! yields exactly-once observation.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::flow::FlowConfig;
use crate::domain::foundation::{deep_merge, SessionId};
use crate::domain::session::{
    Classification, EventEnvelope, SessionEvent, SessionState, ToolCallRecord, ToolResultRecord,
};

/// Lock lease duration; a crashed holder releases passively by expiry.
pub const LOCK_TTL_MS: u64 = 10_000;

/// Errors surfaced by session store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Session {0} is locked by another operation")]
    LockHeld(SessionId),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Wraps a backend error message.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Live subscription to one session's event topic.
///
/// Dropping the subscription releases the underlying topic resources.
pub struct EventSubscription {
    receiver: mpsc::UnboundedReceiver<EventEnvelope>,
}

impl EventSubscription {
    /// Wraps a channel fed by the adapter's pump task.
    pub fn new(receiver: mpsc::UnboundedReceiver<EventEnvelope>) -> Self {
        Self { receiver }
    }

    /// The next published event, or `None` once the topic closes.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        self.receiver.recv().await
    }
}

/// Port for per-session persistence, locking, event log, and pub/sub.
///
/// The derived operations (`update_context`, `transition_to_state`,
/// `store_intent`, `store_tool_call`, `store_tool_result`) are provided
/// on top of the primitive methods so every adapter emits the same
/// correlated events.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a fresh session record and its bound flow.
    async fn create_session(
        &self,
        state: &SessionState,
        flow: &FlowConfig,
    ) -> Result<(), StoreError>;

    /// Loads the session state record.
    async fn load_state(&self, session_id: &SessionId) -> Result<SessionState, StoreError>;

    /// Overwrites the session state record.
    async fn save_state(&self, state: &SessionState) -> Result<(), StoreError>;

    /// Loads the flow bound to the session.
    async fn load_flow(&self, session_id: &SessionId) -> Result<FlowConfig, StoreError>;

    /// True when the session record exists.
    async fn session_exists(&self, session_id: &SessionId) -> Result<bool, StoreError>;

    /// Drops every record belonging to the session.
    async fn delete_session(&self, session_id: &SessionId) -> Result<(), StoreError>;

    /// Acquires the session lock with a fresh nonce and a 10 s lease.
    ///
    /// Fails fast with [`StoreError::LockHeld`] when the lock is taken;
    /// callers may not nest lock scopes on the same session.
    async fn acquire_lock(&self, session_id: &SessionId) -> Result<String, StoreError>;

    /// Releases the lock only if the stored nonce still matches.
    async fn release_lock(&self, session_id: &SessionId, nonce: &str) -> Result<(), StoreError>;

    /// Emits one event: increments `seq`, appends to the log, publishes
    /// on the live topic. Returns the stamped envelope.
    async fn emit(
        &self,
        session_id: &SessionId,
        event: SessionEvent,
    ) -> Result<EventEnvelope, StoreError>;

    /// Range-reads logged events with `seq > since`, in order.
    async fn read_events(
        &self,
        session_id: &SessionId,
        since: u64,
    ) -> Result<Vec<EventEnvelope>, StoreError>;

    /// Opens a live subscription to the session's topic.
    async fn subscribe(&self, session_id: &SessionId) -> Result<EventSubscription, StoreError>;

    // ============================================
    // Derived operations
    // ============================================

    /// Deep-merges a patch into the context and emits `state.updated`.
    async fn update_context(
        &self,
        session_id: &SessionId,
        patch: &Value,
    ) -> Result<SessionState, StoreError> {
        let mut state = self.load_state(session_id).await?;
        deep_merge(&mut state.context, patch);
        self.save_state(&state).await?;
        self.emit(
            session_id,
            SessionEvent::StateUpdated {
                ctx: state.context.clone(),
            },
        )
        .await?;
        Ok(state)
    }

    /// Moves the FSM to `next` and emits `fsm.transition`.
    async fn transition_to_state(
        &self,
        session_id: &SessionId,
        next: &str,
    ) -> Result<SessionState, StoreError> {
        let mut state = self.load_state(session_id).await?;
        let from = std::mem::replace(&mut state.current_state, next.to_string());
        self.save_state(&state).await?;
        self.emit(
            session_id,
            SessionEvent::FsmTransition {
                from,
                to: next.to_string(),
            },
        )
        .await?;
        Ok(state)
    }

    /// Records the latest classification. No event; classification is
    /// visible through the transitions it triggers.
    async fn store_intent(
        &self,
        session_id: &SessionId,
        classification: &Classification,
    ) -> Result<SessionState, StoreError> {
        let mut state = self.load_state(session_id).await?;
        state.last_intent = Some(classification.clone());
        self.save_state(&state).await?;
        Ok(state)
    }

    /// Records an issued tool call and emits the correlated `tool.call`.
    async fn store_tool_call(
        &self,
        session_id: &SessionId,
        record: &ToolCallRecord,
    ) -> Result<SessionState, StoreError> {
        let mut state = self.load_state(session_id).await?;
        state.last_tool_call = Some(record.clone());
        self.save_state(&state).await?;
        self.emit(
            session_id,
            SessionEvent::ToolCall {
                tool_call_id: record.id,
                name: record.name.clone(),
                args: record.args.clone(),
            },
        )
        .await?;
        Ok(state)
    }

    /// Records a tool result and emits the correlated `tool.result`.
    async fn store_tool_result(
        &self,
        session_id: &SessionId,
        record: &ToolResultRecord,
    ) -> Result<SessionState, StoreError> {
        let mut state = self.load_state(session_id).await?;
        state.last_tool_result = Some(record.clone());
        self.save_state(&state).await?;
        self.emit(
            session_id,
            SessionEvent::ToolResult {
                tool_call_id: record.call_id,
                result: record.result.clone(),
            },
        )
        .await?;
        Ok(state)
    }
}
