//! Shared fixtures for the integration suite.

// Each integration binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use callflow::adapters::classifier::PatternClassifier;
use callflow::adapters::memory::InMemorySessionStore;
use callflow::application::demo::{demo_flow, register_demo_tools};
use callflow::application::orchestrator::{Orchestrator, RetryPolicy, ToolRegistry};
use callflow::domain::flow::validate_flow;
use callflow::domain::foundation::SessionId;
use callflow::domain::session::{EventEnvelope, SessionEvent};
use callflow::ports::SessionStore;

pub const FAST_RETRY: RetryPolicy = RetryPolicy {
    attempts: 3,
    delay: Duration::from_millis(50),
};

/// Orchestrator over the in-memory store with the given registry.
pub fn build_orchestrator(
    registry: Arc<ToolRegistry>,
) -> (Arc<Orchestrator>, Arc<InMemorySessionStore>) {
    let store = Arc::new(InMemorySessionStore::new());
    let orchestrator = Arc::new(
        Orchestrator::new(
            store.clone() as Arc<dyn SessionStore>,
            Arc::new(PatternClassifier::new()),
            registry,
        )
        .with_retry_policy(FAST_RETRY)
        .with_reprompt_delays(Duration::from_millis(50), Duration::from_millis(25)),
    );
    (orchestrator, store)
}

/// Demo-flow session with the standard demo workers.
pub async fn demo_session() -> (Arc<Orchestrator>, Arc<InMemorySessionStore>, SessionId) {
    let registry = Arc::new(ToolRegistry::new());
    register_demo_tools(&registry);
    demo_session_with_registry(registry).await
}

/// Demo-flow session with a caller-supplied registry (for failing or
/// slow workers).
pub async fn demo_session_with_registry(
    registry: Arc<ToolRegistry>,
) -> (Arc<Orchestrator>, Arc<InMemorySessionStore>, SessionId) {
    let (orchestrator, store) = build_orchestrator(registry);
    let validated = validate_flow(&demo_flow()).expect("demo flow is valid");
    let session_id = orchestrator
        .create_session(validated.config, None)
        .await
        .expect("session creation succeeds");
    (orchestrator, store, session_id)
}

/// Polls until the session reaches the expected FSM state.
pub async fn wait_for_state(store: &InMemorySessionStore, session_id: &SessionId, expected: &str) {
    for _ in 0..200 {
        let state = store.load_state(session_id).await.expect("session exists");
        if state.current_state == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    let state = store.load_state(session_id).await.expect("session exists");
    panic!(
        "session never reached '{}'; still in '{}'",
        expected, state.current_state
    );
}

/// Polls until the predicate holds over the event log.
pub async fn wait_for_events<F>(
    store: &InMemorySessionStore,
    session_id: &SessionId,
    predicate: F,
) -> Vec<EventEnvelope>
where
    F: Fn(&[EventEnvelope]) -> bool,
{
    for _ in 0..200 {
        let events = store.read_events(session_id, 0).await.expect("log readable");
        if predicate(&events) {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("event log never satisfied the predicate");
}

/// Events of one kind, in log order.
pub fn events_of_kind<'a>(events: &'a [EventEnvelope], kind: &str) -> Vec<&'a EventEnvelope> {
    events
        .iter()
        .filter(|envelope| envelope.event.kind() == kind)
        .collect()
}

/// Asserts the per-session sequence is gapless from 1.
pub fn assert_gapless(events: &[EventEnvelope]) {
    for (index, envelope) in events.iter().enumerate() {
        assert_eq!(
            envelope.seq,
            index as u64 + 1,
            "sequence gap at log position {}",
            index
        );
    }
}

/// The tool name recorded in a `tool.call` envelope.
pub fn tool_call_name(envelope: &EventEnvelope) -> &str {
    match &envelope.event {
        SessionEvent::ToolCall { name, .. } => name,
        other => panic!("expected tool.call, got {:?}", other),
    }
}

/// Extracts a context value from the session state.
pub async fn context_of(store: &InMemorySessionStore, session_id: &SessionId) -> Value {
    store
        .load_state(session_id)
        .await
        .expect("session exists")
        .context
}
