//! In-memory flow repository.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::foundation::{FlowId, Timestamp};
use crate::ports::{FlowRecord, FlowRepository, FlowRepositoryError};

/// Process-local flow repository. Each entry keeps the full version
/// history, oldest first; the last element is the current version.
pub struct InMemoryFlowRepository {
    flows: Mutex<HashMap<FlowId, Vec<FlowRecord>>>,
}

impl InMemoryFlowRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self {
            flows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryFlowRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowRepository for InMemoryFlowRepository {
    async fn list(&self) -> Result<Vec<FlowRecord>, FlowRepositoryError> {
        let flows = self.flows.lock().await;
        let mut records: Vec<FlowRecord> = flows
            .values()
            .filter_map(|history| history.last().cloned())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn get(&self, id: &FlowId) -> Result<Option<FlowRecord>, FlowRepositoryError> {
        let flows = self.flows.lock().await;
        Ok(flows.get(id).and_then(|history| history.last().cloned()))
    }

    async fn create(
        &self,
        name: &str,
        definition: &Value,
    ) -> Result<FlowRecord, FlowRepositoryError> {
        let record = FlowRecord {
            id: FlowId::new(),
            name: name.to_string(),
            version: 1,
            published: false,
            definition: definition.clone(),
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        };
        self.flows
            .lock()
            .await
            .insert(record.id, vec![record.clone()]);
        Ok(record)
    }

    async fn update(
        &self,
        id: &FlowId,
        name: Option<&str>,
        definition: &Value,
    ) -> Result<FlowRecord, FlowRepositoryError> {
        let mut flows = self.flows.lock().await;
        let history = flows
            .get_mut(id)
            .ok_or(FlowRepositoryError::NotFound(*id))?;
        let current = history.last().expect("history is never empty");

        let next = FlowRecord {
            id: *id,
            name: name.unwrap_or(&current.name).to_string(),
            version: current.version + 1,
            published: false,
            definition: definition.clone(),
            created_at: current.created_at,
            updated_at: Timestamp::now(),
        };
        history.push(next.clone());
        Ok(next)
    }

    async fn delete(&self, id: &FlowId) -> Result<(), FlowRepositoryError> {
        self.flows.lock().await.remove(id);
        Ok(())
    }

    async fn publish(&self, id: &FlowId) -> Result<FlowRecord, FlowRepositoryError> {
        let mut flows = self.flows.lock().await;
        let history = flows
            .get_mut(id)
            .ok_or(FlowRepositoryError::NotFound(*id))?;
        let current = history.last_mut().expect("history is never empty");
        current.published = true;
        current.updated_at = Timestamp::now();
        Ok(current.clone())
    }

    async fn versions(&self, id: &FlowId) -> Result<Vec<FlowRecord>, FlowRepositoryError> {
        let flows = self.flows.lock().await;
        flows
            .get(id)
            .cloned()
            .ok_or(FlowRepositoryError::NotFound(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_starts_at_version_one_unpublished() {
        let repo = InMemoryFlowRepository::new();
        let record = repo.create("booking", &json!({"start": "A"})).await.unwrap();

        assert_eq!(record.version, 1);
        assert!(!record.published);
    }

    #[tokio::test]
    async fn update_bumps_version_and_keeps_history() {
        let repo = InMemoryFlowRepository::new();
        let created = repo.create("booking", &json!({"start": "A"})).await.unwrap();

        let updated = repo
            .update(&created.id, None, &json!({"start": "B"}))
            .await
            .unwrap();
        assert_eq!(updated.version, 2);

        let versions = repo.versions(&created.id).await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].definition, json!({"start": "A"}));
        assert_eq!(versions[1].definition, json!({"start": "B"}));
    }

    #[tokio::test]
    async fn publish_marks_current_version() {
        let repo = InMemoryFlowRepository::new();
        let created = repo.create("booking", &json!({})).await.unwrap();

        let published = repo.publish(&created.id).await.unwrap();
        assert!(published.published);
    }

    #[tokio::test]
    async fn update_resets_published_flag() {
        let repo = InMemoryFlowRepository::new();
        let created = repo.create("booking", &json!({})).await.unwrap();
        repo.publish(&created.id).await.unwrap();

        let updated = repo.update(&created.id, None, &json!({})).await.unwrap();
        assert!(!updated.published);
    }

    #[tokio::test]
    async fn get_unknown_flow_returns_none() {
        let repo = InMemoryFlowRepository::new();
        assert!(repo.get(&FlowId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_flow_and_history() {
        let repo = InMemoryFlowRepository::new();
        let created = repo.create("booking", &json!({})).await.unwrap();

        repo.delete(&created.id).await.unwrap();
        assert!(repo.get(&created.id).await.unwrap().is_none());
        assert!(matches!(
            repo.versions(&created.id).await,
            Err(FlowRepositoryError::NotFound(_))
        ));
    }
}
