pub mod memory;
pub mod sqlite;

use crate::{AnalyticsRecord, AnalyticsResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Keyed snapshot persistence. At most one record exists per username.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Insert or fully replace the record for `record.username`.
    async fn upsert(&self, record: AnalyticsRecord) -> AnalyticsResult<AnalyticsRecord>;

    async fn find(&self, username: &str) -> AnalyticsResult<Option<AnalyticsRecord>>;
}

/// SQLite store opened on first use.
///
/// Startup (and `--help`) never touches the database file; the connection
/// is created by the first read or write and shared afterwards.
pub struct StoreHandle {
    path: PathBuf,
    cell: OnceCell<Arc<SqliteStore>>,
}

impl StoreHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> AnalyticsResult<Arc<SqliteStore>> {
        self.cell
            .get_or_try_init(|| async { SqliteStore::open(self.path.clone()).await.map(Arc::new) })
            .await
            .cloned()
    }
}

#[async_trait]
impl AnalyticsStore for StoreHandle {
    async fn upsert(&self, record: AnalyticsRecord) -> AnalyticsResult<AnalyticsRecord> {
        self.get().await?.upsert(record).await
    }

    async fn find(&self, username: &str) -> AnalyticsResult<Option<AnalyticsRecord>> {
        self.get().await?.find(username).await
    }
}
