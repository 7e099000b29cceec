use super::AnalyticsStore;
use crate::{AnalyticsRecord, AnalyticsResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process store for tests and `serve --memory`.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, AnalyticsRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn upsert(&self, record: AnalyticsRecord) -> AnalyticsResult<AnalyticsRecord> {
        self.records
            .write()
            .await
            .insert(record.username.clone(), record.clone());
        Ok(record)
    }

    async fn find(&self, username: &str) -> AnalyticsResult<Option<AnalyticsRecord>> {
        Ok(self.records.read().await.get(username).cloned())
    }
}
