use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use serde_json::json;
use shared::DetectionResult;

use super::CallbackNotifier;

pub struct HttpCallbackNotifier {
    client: reqwest::Client,
    default_url: Option<String>,
}

impl HttpCallbackNotifier {
    pub fn new(default_url: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            default_url,
        })
    }
}

pub(crate) fn build_payload(result: &DetectionResult, timestamp: DateTime<Utc>) -> serde_json::Value {
    json!({
        "task_id": result.task_id,
        "status": "completed",
        "results": {
            "detection_count": result.detections.len(),
            "detections": result.detections,
            "processed_at": result.processed_at,
            "processing_time_ms": result.processing_time_ms,
        },
        "timestamp": timestamp,
    })
}

#[async_trait]
impl CallbackNotifier for HttpCallbackNotifier {
    async fn notify(&self, callback_url: Option<&str>, result: &DetectionResult) {
        let url = match callback_url.or(self.default_url.as_deref()) {
            Some(url) => url,
            None => return,
        };

        let payload = build_payload(result, Utc::now());
        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match response {
            Ok(_) => info!("Callback delivered for task {}", result.task_id),
            Err(e) => error!("Callback delivery failed for task {}: {}", result.task_id, e),
        }
    }
}
