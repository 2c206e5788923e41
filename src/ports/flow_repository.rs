//! FlowRepository port - Persisted flow definitions and versions.
//!
//! Flow persistence is an editing concern, separate from the session
//! store: a session binds an immutable copy of its flow at creation time
//! and never reads the repository again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::foundation::{FlowId, Timestamp};

/// Errors surfaced by flow repository operations.
#[derive(Debug, Error)]
pub enum FlowRepositoryError {
    #[error("Flow not found: {0}")]
    NotFound(FlowId),

    #[error("Flow repository backend error: {0}")]
    Backend(String),
}

/// A persisted flow definition with version bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowRecord {
    pub id: FlowId,
    pub name: String,
    pub version: u32,
    pub published: bool,
    pub definition: Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Port for flow definition CRUD and version history.
#[async_trait]
pub trait FlowRepository: Send + Sync {
    /// Lists the current version of every flow.
    async fn list(&self) -> Result<Vec<FlowRecord>, FlowRepositoryError>;

    /// Fetches the current version of one flow.
    async fn get(&self, id: &FlowId) -> Result<Option<FlowRecord>, FlowRepositoryError>;

    /// Persists a new flow at version 1.
    async fn create(
        &self,
        name: &str,
        definition: &Value,
    ) -> Result<FlowRecord, FlowRepositoryError>;

    /// Replaces the definition, bumping the version and archiving the
    /// previous one in the history.
    async fn update(
        &self,
        id: &FlowId,
        name: Option<&str>,
        definition: &Value,
    ) -> Result<FlowRecord, FlowRepositoryError>;

    /// Deletes the flow and its history.
    async fn delete(&self, id: &FlowId) -> Result<(), FlowRepositoryError>;

    /// Marks the current version as published.
    async fn publish(&self, id: &FlowId) -> Result<FlowRecord, FlowRepositoryError>;

    /// Version history, oldest first, ending with the current version.
    async fn versions(&self, id: &FlowId) -> Result<Vec<FlowRecord>, FlowRepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn FlowRepository) {}
}
