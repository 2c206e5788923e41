//! WebSocket upgrade handler for live session observers.
//!
//! Connection lifecycle:
//! 1. Validate the session id and that the session exists
//! 2. Upgrade and join the session's fan-out room
//! 3. Send the synthetic `session.started` greeting
//! 4. Forward room events and process client frames until disconnect
//! 5. Detach from the room
//!
//! A client disconnection cancels only this observer, never the session.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::application::orchestrator::Orchestrator;
use crate::domain::foundation::{ClientId, SessionId};
use crate::domain::session::EventEnvelope;

use super::hub::ObserverHub;
use super::messages::{error_frame, ClientMessage};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub hub: Arc<ObserverHub>,
    pub orchestrator: Arc<Orchestrator>,
}

impl WebSocketState {
    /// Creates WebSocket state.
    pub fn new(hub: Arc<ObserverHub>, orchestrator: Arc<Orchestrator>) -> Self {
        Self { hub, orchestrator }
    }
}

/// Builds the live-observer router.
pub fn ws_routes(state: WebSocketState) -> Router {
    Router::new()
        .route("/api/sessions/:session_id/live", get(ws_handler))
        .with_state(state)
}

/// Handles WebSocket upgrade requests for live session observation.
///
/// Route: `GET /api/sessions/:session_id/live`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<WebSocketState>,
) -> Response {
    let session_id: SessionId = match session_id.parse() {
        Ok(id) => id,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "Invalid session ID").into_response();
        }
    };

    match state.orchestrator.store().session_exists(&session_id).await {
        Ok(true) => {}
        Ok(false) => return (StatusCode::NOT_FOUND, "Session not found").into_response(),
        Err(e) => {
            tracing::error!(%session_id, error = %e, "Session lookup failed during upgrade");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Store unavailable").into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

/// Runs for the lifetime of one observer connection.
async fn handle_socket(socket: WebSocket, session_id: SessionId, state: WebSocketState) {
    let client_id = ClientId::new();

    let mut room_rx = match state.hub.attach(&session_id).await {
        Ok(rx) => rx,
        Err(e) => {
            tracing::debug!(%session_id, %client_id, error = %e, "Observer failed to attach");
            return;
        }
    };
    tracing::debug!(%session_id, %client_id, "Observer attached");

    let (mut sender, mut receiver) = socket.split();

    // Synthetic greeting before any replayed or live events.
    let greeting = EventEnvelope::session_started(session_id);
    if send_envelope(&mut sender, &greeting).await.is_err() {
        state.hub.detach(&session_id).await;
        return;
    }

    loop {
        tokio::select! {
            event = room_rx.recv() => match event {
                Ok(envelope) => {
                    if send_envelope(&mut sender, &envelope).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(%session_id, missed, "Observer lagged; catch-up read required");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if handle_client_frame(&text, &session_id, &state, &mut sender).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // Ping/pong handled by the transport.
                Some(Err(e)) => {
                    tracing::debug!(%session_id, error = %e, "Observer socket error");
                    break;
                }
            },
        }
    }

    state.hub.detach(&session_id).await;
    tracing::debug!(%session_id, %client_id, "Observer detached");
}

/// Processes one client frame. Returns true when the connection should
/// close.
async fn handle_client_frame(
    text: &str,
    session_id: &SessionId,
    state: &WebSocketState,
    sender: &mut (impl SinkExt<Message> + Unpin),
) -> bool {
    let frame: ClientMessage = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => {
            let _ = sender
                .send(Message::Text(error_frame("unknown frame")))
                .await;
            return false;
        }
    };

    let input = match frame {
        ClientMessage::UserText { text } => text,
        ClientMessage::UserDtmf { digits } => digits,
        ClientMessage::Cancel => return true,
    };

    if let Err(e) = state
        .orchestrator
        .process_user_input(session_id, &input)
        .await
    {
        tracing::debug!(%session_id, error = %e, "User input failed");
        let _ = sender
            .send(Message::Text(error_frame(&e.to_string())))
            .await;
    }
    false
}

async fn send_envelope(
    sender: &mut (impl SinkExt<Message> + Unpin),
    envelope: &EventEnvelope,
) -> Result<(), ()> {
    let json = serde_json::to_string(envelope).map_err(|_| ())?;
    sender.send(Message::Text(json)).await.map_err(|_| ())
}
