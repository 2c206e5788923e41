//! In-memory session store.
//!
//! Implements the full store contract (lock with lease expiry, gapless
//! event log, live pub/sub) against a process-local map. Semantics match
//! the Redis adapter so tests exercise the same behavior the production
//! store provides.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::domain::flow::FlowConfig;
use crate::domain::foundation::SessionId;
use crate::domain::session::{EventEnvelope, SessionEvent, SessionState};
use crate::ports::{EventSubscription, SessionStore, StoreError, LOCK_TTL_MS};

struct LockEntry {
    nonce: String,
    expires_at: Instant,
}

struct SessionRecord {
    state: SessionState,
    flow: FlowConfig,
    seq: u64,
    log: Vec<EventEnvelope>,
    lock: Option<LockEntry>,
    subscribers: Vec<mpsc::UnboundedSender<EventEnvelope>>,
}

/// Process-local session store.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, SessionRecord>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(
        &self,
        state: &SessionState,
        flow: &FlowConfig,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            state.session_id,
            SessionRecord {
                state: state.clone(),
                flow: flow.clone(),
                seq: 0,
                log: Vec::new(),
                lock: None,
                subscribers: Vec::new(),
            },
        );
        Ok(())
    }

    async fn load_state(&self, session_id: &SessionId) -> Result<SessionState, StoreError> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_id)
            .map(|record| record.state.clone())
            .ok_or(StoreError::NotFound(*session_id))
    }

    async fn save_state(&self, state: &SessionState) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(&state.session_id)
            .ok_or(StoreError::NotFound(state.session_id))?;
        record.state = state.clone();
        Ok(())
    }

    async fn load_flow(&self, session_id: &SessionId) -> Result<FlowConfig, StoreError> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_id)
            .map(|record| record.flow.clone())
            .ok_or(StoreError::NotFound(*session_id))
    }

    async fn session_exists(&self, session_id: &SessionId) -> Result<bool, StoreError> {
        Ok(self.sessions.lock().await.contains_key(session_id))
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), StoreError> {
        // Dropping the record drops its subscriber senders, which closes
        // every live subscription for the session.
        self.sessions.lock().await.remove(session_id);
        Ok(())
    }

    async fn acquire_lock(&self, session_id: &SessionId) -> Result<String, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or(StoreError::NotFound(*session_id))?;

        if let Some(lock) = &record.lock {
            if lock.expires_at > Instant::now() {
                return Err(StoreError::LockHeld(*session_id));
            }
        }

        let nonce = Uuid::new_v4().to_string();
        record.lock = Some(LockEntry {
            nonce: nonce.clone(),
            expires_at: Instant::now() + Duration::from_millis(LOCK_TTL_MS),
        });
        Ok(nonce)
    }

    async fn release_lock(&self, session_id: &SessionId, nonce: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(record) = sessions.get_mut(session_id) {
            if record
                .lock
                .as_ref()
                .is_some_and(|lock| lock.nonce == nonce)
            {
                record.lock = None;
            }
        }
        Ok(())
    }

    async fn emit(
        &self,
        session_id: &SessionId,
        event: SessionEvent,
    ) -> Result<EventEnvelope, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or(StoreError::NotFound(*session_id))?;

        record.seq += 1;
        let envelope = EventEnvelope::new(*session_id, record.seq, event);
        record.log.push(envelope.clone());
        record
            .subscribers
            .retain(|sender| sender.send(envelope.clone()).is_ok());
        Ok(envelope)
    }

    async fn read_events(
        &self,
        session_id: &SessionId,
        since: u64,
    ) -> Result<Vec<EventEnvelope>, StoreError> {
        let sessions = self.sessions.lock().await;
        let record = sessions
            .get(session_id)
            .ok_or(StoreError::NotFound(*session_id))?;
        Ok(record
            .log
            .iter()
            .filter(|envelope| envelope.seq > since)
            .cloned()
            .collect())
    }

    async fn subscribe(&self, session_id: &SessionId) -> Result<EventSubscription, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or(StoreError::NotFound(*session_id))?;

        let (sender, receiver) = mpsc::unbounded_channel();
        record.subscribers.push(sender);
        Ok(EventSubscription::new(receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionEvent;
    use serde_json::json;

    fn minimal_flow() -> FlowConfig {
        serde_json::from_value(json!({
            "meta": {"name": "test"},
            "start": "A",
            "states": {"A": {}}
        }))
        .unwrap()
    }

    async fn store_with_session() -> (InMemorySessionStore, SessionId) {
        let store = InMemorySessionStore::new();
        let session_id = SessionId::new();
        let state = SessionState::new(session_id, "A");
        store.create_session(&state, &minimal_flow()).await.unwrap();
        (store, session_id)
    }

    #[tokio::test]
    async fn emit_assigns_gapless_monotonic_sequence() {
        let (store, session_id) = store_with_session().await;

        for _ in 0..5 {
            store
                .emit(&session_id, SessionEvent::Say { text: "hi".into() })
                .await
                .unwrap();
        }

        let events = store.read_events(&session_id, 0).await.unwrap();
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn read_events_since_is_exclusive() {
        let (store, session_id) = store_with_session().await;
        for _ in 0..4 {
            store
                .emit(&session_id, SessionEvent::Hangup)
                .await
                .unwrap();
        }

        let events = store.read_events(&session_id, 2).await.unwrap();
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
    }

    #[tokio::test]
    async fn second_lock_acquisition_fails_fast() {
        let (store, session_id) = store_with_session().await;

        let nonce = store.acquire_lock(&session_id).await.unwrap();
        assert!(matches!(
            store.acquire_lock(&session_id).await,
            Err(StoreError::LockHeld(_))
        ));

        store.release_lock(&session_id, &nonce).await.unwrap();
        store.acquire_lock(&session_id).await.unwrap();
    }

    #[tokio::test]
    async fn release_with_wrong_nonce_keeps_lock() {
        let (store, session_id) = store_with_session().await;

        let _nonce = store.acquire_lock(&session_id).await.unwrap();
        store
            .release_lock(&session_id, "stale-nonce")
            .await
            .unwrap();
        assert!(matches!(
            store.acquire_lock(&session_id).await,
            Err(StoreError::LockHeld(_))
        ));
    }

    #[tokio::test]
    async fn subscriber_receives_emitted_events() {
        let (store, session_id) = store_with_session().await;
        let mut subscription = store.subscribe(&session_id).await.unwrap();

        store
            .emit(&session_id, SessionEvent::Say { text: "live".into() })
            .await
            .unwrap();

        let envelope = subscription.next().await.unwrap();
        assert_eq!(envelope.seq, 1);
        assert_eq!(envelope.event, SessionEvent::Say { text: "live".into() });
    }

    #[tokio::test]
    async fn deleting_session_closes_subscriptions() {
        let (store, session_id) = store_with_session().await;
        let mut subscription = store.subscribe(&session_id).await.unwrap();

        store.delete_session(&session_id).await.unwrap();
        assert!(subscription.next().await.is_none());
        assert!(!store.session_exists(&session_id).await.unwrap());
    }

    #[tokio::test]
    async fn update_context_merges_and_emits() {
        let (store, session_id) = store_with_session().await;

        store
            .update_context(&session_id, &json!({"partySize": 4}))
            .await
            .unwrap();
        let state = store
            .update_context(&session_id, &json!({"contact": {"name": "John Doe"}}))
            .await
            .unwrap();

        assert_eq!(
            state.context,
            json!({"partySize": 4, "contact": {"name": "John Doe"}})
        );

        let events = store.read_events(&session_id, 0).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| matches!(e.event, SessionEvent::StateUpdated { .. })));
    }

    #[tokio::test]
    async fn transition_records_old_and_new_names() {
        let (store, session_id) = store_with_session().await;

        store.transition_to_state(&session_id, "B").await.unwrap();
        let events = store.read_events(&session_id, 0).await.unwrap();
        assert_eq!(
            events[0].event,
            SessionEvent::FsmTransition {
                from: "A".into(),
                to: "B".into()
            }
        );
    }
}
