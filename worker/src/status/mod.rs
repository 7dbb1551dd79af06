mod dynamo_store;

pub use dynamo_store::DynamoStatusStore;

use async_trait::async_trait;
use shared::{DetectionResult, StatusRecord, TaskStatus};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StatusStoreError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
    #[error("Serde JSON error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid status record: {0}")]
    InvalidRecord(String),
}

/// Keyed, TTL-bounded status record store.
///
/// Update-only: status records are seeded by the upstream submission path, so
/// `set_status` for an id with no existing record is a no-op, not an error.
#[async_trait]
pub trait TaskStatusStore: Send + Sync {
    async fn set_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
        result: Option<&DetectionResult>,
    ) -> Result<(), StatusStoreError>;

    async fn get_status(&self, task_id: Uuid) -> Result<Option<StatusRecord>, StatusStoreError>;
}
