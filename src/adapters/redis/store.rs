//! Redis-backed session store.
//!
//! Record layout per session `S`:
//!
//! - `state:S` - serialized SessionState
//! - `flow:S` - serialized FlowConfig
//! - `seq:S` - monotonic counter (INCR)
//! - `stream:S` - ordered event log (RPUSH / LRANGE)
//! - `lock:S` - lock key (SET NX PX, compare-and-delete release)
//!
//! and the live topic `pub:S` (PUBLISH / SUBSCRIBE). Log entries are JSON
//! objects with the envelope serialized under the single field `json`.
//!
//! Events are only emitted by the current lock holder, so INCR-then-RPUSH
//! keeps the log ordered without a transaction.

use async_trait::async_trait;
use futures::StreamExt;
use once_cell::sync::Lazy;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::flow::FlowConfig;
use crate::domain::foundation::SessionId;
use crate::domain::session::{EventEnvelope, SessionEvent, SessionState};
use crate::ports::{EventSubscription, SessionStore, StoreError, LOCK_TTL_MS};

/// Release deletes the lock only when the stored nonce still matches.
static RELEASE_LOCK: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            return redis.call('DEL', KEYS[1])
        else
            return 0
        end
        "#,
    )
});

fn state_key(id: &SessionId) -> String {
    format!("state:{}", id)
}

fn flow_key(id: &SessionId) -> String {
    format!("flow:{}", id)
}

fn seq_key(id: &SessionId) -> String {
    format!("seq:{}", id)
}

fn stream_key(id: &SessionId) -> String {
    format!("stream:{}", id)
}

fn lock_key(id: &SessionId) -> String {
    format!("lock:{}", id)
}

fn topic(id: &SessionId) -> String {
    format!("pub:{}", id)
}

/// Production session store backed by Redis.
#[derive(Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisSessionStore {
    /// Connects to the given Redis URL.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(StoreError::backend)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::backend)?;
        Ok(Self { client, conn })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// One event-log entry: the envelope serialized under a single field.
#[derive(serde::Serialize, serde::Deserialize)]
struct LogEntry {
    json: String,
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create_session(
        &self,
        state: &SessionState,
        flow: &FlowConfig,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        conn.set::<_, _, ()>(state_key(&state.session_id), to_json(state)?)
            .await
            .map_err(StoreError::backend)?;
        conn.set::<_, _, ()>(flow_key(&state.session_id), to_json(flow)?)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn load_state(&self, session_id: &SessionId) -> Result<SessionState, StoreError> {
        let raw: Option<String> = self
            .conn()
            .get(state_key(session_id))
            .await
            .map_err(StoreError::backend)?;
        let raw = raw.ok_or(StoreError::NotFound(*session_id))?;
        from_json(&raw)
    }

    async fn save_state(&self, state: &SessionState) -> Result<(), StoreError> {
        self.conn()
            .set::<_, _, ()>(state_key(&state.session_id), to_json(state)?)
            .await
            .map_err(StoreError::backend)
    }

    async fn load_flow(&self, session_id: &SessionId) -> Result<FlowConfig, StoreError> {
        let raw: Option<String> = self
            .conn()
            .get(flow_key(session_id))
            .await
            .map_err(StoreError::backend)?;
        let raw = raw.ok_or(StoreError::NotFound(*session_id))?;
        from_json(&raw)
    }

    async fn session_exists(&self, session_id: &SessionId) -> Result<bool, StoreError> {
        self.conn()
            .exists(state_key(session_id))
            .await
            .map_err(StoreError::backend)
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), StoreError> {
        self.conn()
            .del::<_, ()>(vec![
                state_key(session_id),
                flow_key(session_id),
                seq_key(session_id),
                stream_key(session_id),
                lock_key(session_id),
            ])
            .await
            .map_err(StoreError::backend)
    }

    async fn acquire_lock(&self, session_id: &SessionId) -> Result<String, StoreError> {
        let nonce = Uuid::new_v4().to_string();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(lock_key(session_id))
            .arg(&nonce)
            .arg("NX")
            .arg("PX")
            .arg(LOCK_TTL_MS)
            .query_async(&mut self.conn())
            .await
            .map_err(StoreError::backend)?;

        match acquired {
            Some(_) => Ok(nonce),
            None => Err(StoreError::LockHeld(*session_id)),
        }
    }

    async fn release_lock(&self, session_id: &SessionId, nonce: &str) -> Result<(), StoreError> {
        let _deleted: i64 = RELEASE_LOCK
            .key(lock_key(session_id))
            .arg(nonce)
            .invoke_async(&mut self.conn())
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn emit(
        &self,
        session_id: &SessionId,
        event: SessionEvent,
    ) -> Result<EventEnvelope, StoreError> {
        let mut conn = self.conn();
        let seq: u64 = conn
            .incr(seq_key(session_id), 1u64)
            .await
            .map_err(StoreError::backend)?;

        let envelope = EventEnvelope::new(*session_id, seq, event);
        let envelope_json = to_json(&envelope)?;
        let entry = to_json(&LogEntry {
            json: envelope_json.clone(),
        })?;

        conn.rpush::<_, _, ()>(stream_key(session_id), entry)
            .await
            .map_err(StoreError::backend)?;
        conn.publish::<_, _, ()>(topic(session_id), envelope_json)
            .await
            .map_err(StoreError::backend)?;
        Ok(envelope)
    }

    async fn read_events(
        &self,
        session_id: &SessionId,
        since: u64,
    ) -> Result<Vec<EventEnvelope>, StoreError> {
        // seq is 1-based and gapless, so the entry with seq N sits at
        // list index N-1; entries after `since` start at index `since`.
        let raw: Vec<String> = self
            .conn()
            .lrange(stream_key(session_id), since as isize, -1)
            .await
            .map_err(StoreError::backend)?;

        let mut events = Vec::with_capacity(raw.len());
        for entry in raw {
            let entry: LogEntry = from_json(&entry)?;
            let envelope: EventEnvelope = from_json(&entry.json)?;
            if envelope.seq > since {
                events.push(envelope);
            }
        }
        Ok(events)
    }

    async fn subscribe(&self, session_id: &SessionId) -> Result<EventSubscription, StoreError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(StoreError::backend)?;
        pubsub
            .subscribe(topic(session_id))
            .await
            .map_err(StoreError::backend)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let session_id = *session_id;

        tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            loop {
                tokio::select! {
                    message = messages.next() => {
                        let Some(message) = message else { break };
                        let payload: String = match message.get_payload() {
                            Ok(payload) => payload,
                            Err(e) => {
                                tracing::warn!(%session_id, error = %e, "Dropping unreadable pub/sub payload");
                                continue;
                            }
                        };
                        match serde_json::from_str::<EventEnvelope>(&payload) {
                            Ok(envelope) => {
                                if sender.send(envelope).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(%session_id, error = %e, "Dropping undecodable event");
                            }
                        }
                    }
                    _ = sender.closed() => break,
                }
            }
        });

        Ok(EventSubscription::new(receiver))
    }
}
