use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{sort_recent_first, DiscussionRecord, DiscussionRepository, DiscussionSummary};
use crate::error::{Result, ServiceError};

/// Process-local repository, used by tests and ephemeral sessions.
#[derive(Default)]
pub struct InMemoryDiscussionRepository {
    records: RwLock<HashMap<Uuid, DiscussionRecord>>,
}

impl InMemoryDiscussionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl DiscussionRepository for InMemoryDiscussionRepository {
    async fn load(&self, uuid: Uuid) -> Result<DiscussionRecord> {
        self.records
            .read()
            .await
            .get(&uuid)
            .cloned()
            .ok_or(ServiceError::DiscussionNotFound(uuid))
    }

    async fn save(&self, record: &DiscussionRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.uuid, record.clone());
        Ok(())
    }

    async fn delete(&self, uuid: Uuid) -> Result<bool> {
        Ok(self.records.write().await.remove(&uuid).is_some())
    }

    async fn list(&self, owner: Option<&str>) -> Result<Vec<DiscussionSummary>> {
        let records = self.records.read().await;
        let mut summaries: Vec<DiscussionSummary> = records
            .values()
            .filter(|r| owner.is_none() || r.owner.as_deref() == owner)
            .map(DiscussionSummary::from)
            .collect();
        sort_recent_first(&mut summaries);
        Ok(summaries)
    }
}
