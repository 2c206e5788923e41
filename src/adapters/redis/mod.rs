//! Redis adapters.
//!
//! The production session store: per-session records, a SET NX PX lock
//! with compare-and-delete release, an append-only event log, an atomic
//! sequence counter, and topic-based pub/sub.

mod store;

pub use store::RedisSessionStore;
