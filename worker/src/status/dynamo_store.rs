use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use shared::{DetectionResult, StatusRecord, TaskStatus};
use uuid::Uuid;

use super::{StatusStoreError, TaskStatusStore};

#[derive(Clone)]
pub struct DynamoStatusStore {
    client: Client,
    table_name: String,
    ttl: Duration,
}

impl DynamoStatusStore {
    pub fn new(client: Client, table_name: String, ttl: Duration) -> Self {
        Self {
            client,
            table_name,
            ttl,
        }
    }

    fn record_from_attributes(
        &self,
        attributes: std::collections::HashMap<String, AttributeValue>,
    ) -> Result<StatusRecord, StatusStoreError> {
        let task_id = attributes
            .get("task_id")
            .and_then(|av| av.as_s().ok())
            .ok_or_else(|| StatusStoreError::InvalidRecord("missing task_id attribute".into()))?;
        let task_id = Uuid::parse_str(task_id)
            .map_err(|e| StatusStoreError::InvalidRecord(format!("bad task_id: {}", e)))?;

        let status = match attributes
            .get("status")
            .and_then(|av| av.as_s().ok())
            .map(String::as_str)
        {
            Some("PROCESSING") => TaskStatus::Processing,
            Some("COMPLETED") => TaskStatus::Completed,
            Some("FAILED") => TaskStatus::Failed,
            _ => TaskStatus::Pending,
        };

        let updated_at = attributes
            .get("updated_at")
            .and_then(|av| av.as_s().ok())
            .ok_or_else(|| StatusStoreError::InvalidRecord("missing updated_at attribute".into()))?;
        let updated_at = DateTime::parse_from_rfc3339(updated_at)
            .map_err(|e| StatusStoreError::InvalidRecord(format!("bad updated_at: {}", e)))?
            .with_timezone(&Utc);

        let result = match attributes.get("result").and_then(|av| av.as_s().ok()) {
            Some(json) => Some(serde_json::from_str::<DetectionResult>(json)?),
            None => None,
        };

        Ok(StatusRecord {
            task_id,
            status,
            updated_at,
            result,
        })
    }
}

#[async_trait]
impl TaskStatusStore for DynamoStatusStore {
    async fn set_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
        result: Option<&DetectionResult>,
    ) -> Result<(), StatusStoreError> {
        let now = Utc::now();
        let expires_at = now.timestamp() + self.ttl.as_secs() as i64;

        let mut expression =
            "SET #status = :status, updated_at = :updated_at, expires_at = :expires_at".to_string();
        let mut update = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("task_id", AttributeValue::S(task_id.to_string()))
            .condition_expression("attribute_exists(task_id)")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":status", AttributeValue::S(status.as_str().to_string()))
            .expression_attribute_values(":updated_at", AttributeValue::S(now.to_rfc3339()))
            .expression_attribute_values(":expires_at", AttributeValue::N(expires_at.to_string()));

        if let Some(result) = result {
            expression.push_str(", #result = :result");
            update = update
                .expression_attribute_names("#result", "result")
                .expression_attribute_values(
                    ":result",
                    AttributeValue::S(serde_json::to_string(result)?),
                );
        }

        match update.update_expression(expression).send().await {
            Ok(_) => {
                debug!("Task {} status updated to {}", task_id, status.as_str());
                Ok(())
            }
            Err(e) => {
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception())
                {
                    // Records are seeded by the submission API; nothing to update here.
                    warn!("No status record for task {}, update dropped", task_id);
                    Ok(())
                } else {
                    Err(StatusStoreError::DynamoDb(e.to_string()))
                }
            }
        }
    }

    async fn get_status(&self, task_id: Uuid) -> Result<Option<StatusRecord>, StatusStoreError> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("task_id", AttributeValue::S(task_id.to_string()))
            .send()
            .await
            .map_err(|e| StatusStoreError::DynamoDb(e.to_string()))?;

        match response.item {
            Some(item) => Ok(Some(self.record_from_attributes(item)?)),
            None => Ok(None),
        }
    }
}
