//! Adapters layer - Concrete implementations of the ports.
//!
//! # Adapter Categories
//!
//! - `redis` - Production session store (lock, log, counter, pub/sub)
//! - `memory` - In-memory session store and flow repository
//! - `classifier` - Deterministic pattern classifier + remote HTTP classifier
//! - `http` - REST surface (axum)
//! - `websocket` - Live observer fan-out (axum ws + broadcast rooms)

pub mod classifier;
pub mod http;
pub mod memory;
pub mod redis;
pub mod websocket;
