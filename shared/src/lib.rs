use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One queued unit of work: an image to analyze, and optionally a per-task
/// destination for the completion callback.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TaskMessage {
    pub task_id: Uuid,
    pub image_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid bounding box ({x1}, {y1}) -> ({x2}, {y2})")]
pub struct InvalidBoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Axis-aligned rectangle in image pixel coordinates.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Invariant: `x1 <= x2` and `y1 <= y2`.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self, InvalidBoundingBox> {
        if x1 > x2 || y1 > y2 {
            return Err(InvalidBoundingBox { x1, y1, x2, y2 });
        }
        Ok(Self { x1, y1, x2, y2 })
    }
}

/// One recognized object instance. Produced only by the detection engine.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Detection {
    pub class_id: i64,
    pub class_name: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// The full output of processing one task, as persisted to blob storage.
/// `detections` keeps the engine's output order.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectionResult {
    pub task_id: Uuid,
    pub detections: Vec<Detection>,
    pub processed_at: DateTime<Utc>,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

/// The persisted lifecycle state of a task. Expires from the status table
/// after the configured TTL.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatusRecord {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DetectionResult>,
}
