//! Observer hub: reference-counted fan-out of session events.
//!
//! One room per session. The room holds a broadcast channel and the
//! single pump task that drains the store subscription into it. The
//! subscription is opened on the first observer and dropped when the
//! observer count reaches zero.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::domain::foundation::SessionId;
use crate::domain::session::EventEnvelope;
use crate::ports::{SessionStore, StoreError};

/// Buffered events per room; slow observers that lag past this window
/// re-synchronize through the durable log.
const ROOM_CAPACITY: usize = 256;

struct Room {
    sender: broadcast::Sender<EventEnvelope>,
    observers: usize,
    pump: JoinHandle<()>,
}

/// Fan-out table shared across sessions. Mutation is confined to this
/// layer; the per-session records stay owned by the lock holder.
pub struct ObserverHub {
    store: Arc<dyn SessionStore>,
    rooms: Mutex<HashMap<SessionId, Room>>,
}

impl ObserverHub {
    /// Creates an empty hub over the given store.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Attaches an observer, opening the store subscription if this is
    /// the session's first.
    pub async fn attach(
        &self,
        session_id: &SessionId,
    ) -> Result<broadcast::Receiver<EventEnvelope>, StoreError> {
        let mut rooms = self.rooms.lock().await;

        if let Some(room) = rooms.get_mut(session_id) {
            room.observers += 1;
            return Ok(room.sender.subscribe());
        }

        let mut subscription = self.store.subscribe(session_id).await?;
        let (sender, receiver) = broadcast::channel(ROOM_CAPACITY);

        let pump_sender = sender.clone();
        let pump_session = *session_id;
        let pump = tokio::spawn(async move {
            while let Some(envelope) = subscription.next().await {
                // Send fails only when no observer is currently attached;
                // the durable log covers whatever they miss.
                let _ = pump_sender.send(envelope);
            }
            tracing::debug!(session_id = %pump_session, "Session topic closed; fan-out pump ending");
        });

        rooms.insert(
            *session_id,
            Room {
                sender,
                observers: 1,
                pump,
            },
        );
        Ok(receiver)
    }

    /// Detaches one observer, closing the subscription when the room
    /// empties.
    pub async fn detach(&self, session_id: &SessionId) {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get_mut(session_id) else {
            return;
        };
        room.observers = room.observers.saturating_sub(1);
        if room.observers == 0 {
            let room = rooms.remove(session_id).expect("room present");
            room.pump.abort();
        }
    }

    /// Current observer count for a session.
    pub async fn observer_count(&self, session_id: &SessionId) -> usize {
        self.rooms
            .lock()
            .await
            .get(session_id)
            .map(|room| room.observers)
            .unwrap_or(0)
    }
}
