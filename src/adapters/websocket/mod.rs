//! WebSocket fan-out layer.
//!
//! Bridges the session store's pub/sub to N live observers per session.
//! The first observer for a session opens one store subscription; the
//! last observer leaving closes it. Dead observers are evicted, and
//! every newly attached observer is greeted with a synthetic
//! `session.started` before any live events.

mod handler;
mod hub;
mod messages;

pub use handler::{ws_routes, WebSocketState};
pub use hub::ObserverHub;
pub use messages::ClientMessage;
