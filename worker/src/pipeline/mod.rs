use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{info, warn};
use shared::{DetectionResult, TaskMessage, TaskStatus};
use uuid::Uuid;

use crate::callback::CallbackNotifier;
use crate::detector::{DetectionEngine, InferenceError};
use crate::status::{StatusStoreError, TaskStatusStore};
use crate::storage::{ImageStore, ImageStoreError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("image store error: {0}")]
    Image(#[from] ImageStoreError),
    #[error("inference error: {0}")]
    Inference(#[from] InferenceError),
    #[error("status store error: {0}")]
    Status(#[from] StatusStoreError),
}

fn result_key(task_id: Uuid) -> String {
    format!("results/{}/detection_results.json", task_id)
}

/// Drives one task through `processing -> completed | failed`.
///
/// Adapters are fixed at construction; nothing here is mutated after startup.
pub struct Pipeline {
    image_store: Arc<dyn ImageStore>,
    engine: Arc<dyn DetectionEngine>,
    status_store: Arc<dyn TaskStatusStore>,
    notifier: Arc<dyn CallbackNotifier>,
}

impl Pipeline {
    pub fn new(
        image_store: Arc<dyn ImageStore>,
        engine: Arc<dyn DetectionEngine>,
        status_store: Arc<dyn TaskStatusStore>,
        notifier: Arc<dyn CallbackNotifier>,
    ) -> Self {
        Self {
            image_store,
            engine,
            status_store,
            notifier,
        }
    }

    pub async fn execute(&self, task: &TaskMessage) -> Result<DetectionResult, PipelineError> {
        let started = Instant::now();
        info!("Processing task {}", task.task_id);

        let result = match self.process(task, started).await {
            Ok(result) => result,
            Err(e) => {
                self.mark_failed(task.task_id).await;
                return Err(e);
            }
        };

        // The result blob is durable from here on; nothing below may demote
        // the task to failed.
        self.status_store
            .set_status(task.task_id, TaskStatus::Completed, Some(&result))
            .await?;

        self.notifier
            .notify(task.callback_url.as_deref(), &result)
            .await;

        info!(
            "Task {} completed with {} detections in {}ms",
            task.task_id,
            result.detections.len(),
            result.processing_time_ms
        );
        Ok(result)
    }

    async fn process(
        &self,
        task: &TaskMessage,
        started: Instant,
    ) -> Result<DetectionResult, PipelineError> {
        self.status_store
            .set_status(task.task_id, TaskStatus::Processing, None)
            .await?;

        let image = self.image_store.retrieve_image(&task.image_path).await?;
        let detections = self.engine.detect(&image)?;

        let result = DetectionResult {
            task_id: task.task_id,
            detections,
            processed_at: Utc::now(),
            processing_time_ms: started.elapsed().as_millis() as u64,
        };

        self.image_store
            .store_result(&result_key(task.task_id), &result)
            .await?;

        Ok(result)
    }

    async fn mark_failed(&self, task_id: Uuid) {
        if let Err(e) = self
            .status_store
            .set_status(task_id, TaskStatus::Failed, None)
            .await
        {
            warn!("Could not record failed status for task {}: {}", task_id, e);
        }
    }
}
