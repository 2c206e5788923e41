//! Ports layer - Interfaces between the engine and the outside world.
//!
//! Ports define what the engine needs without prescribing how it's
//! provided. Adapters implement these traits for concrete backends.
//!
//! # Port Categories
//!
//! - `session_store` - Per-session persistence, locking, event log, pub/sub
//! - `classifier` - Intent classification contract
//! - `tool_worker` - Tool execution contract
//! - `flow_repository` - Persisted flow definitions and versions

mod classifier;
mod flow_repository;
mod session_store;
mod tool_worker;

pub use classifier::{ClassifierError, IntentClassifier};
pub use flow_repository::{FlowRecord, FlowRepository, FlowRepositoryError};
pub use session_store::{EventSubscription, SessionStore, StoreError, LOCK_TTL_MS};
pub use tool_worker::{ToolWorker, ToolWorkerError};
