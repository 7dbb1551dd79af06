mod classes;
mod torch_detector;

pub use torch_detector::TorchDetector;

use image::RgbImage;
use shared::{BoundingBox, Detection};

pub(crate) use classes::COCO_CLASSES;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("model error: {0}")]
    Model(#[from] tch::TchError),
    #[error("unexpected model output: {0}")]
    Output(String),
}

/// Stateless inference port. The confidence threshold is fixed at
/// construction; callers get back only detections at or above it.
pub trait DetectionEngine: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError>;
}

/// One row of raw model output before thresholding.
#[derive(Debug, Clone)]
pub(crate) struct RawDetection {
    pub class_id: i64,
    pub confidence: f64,
    pub bbox: [f64; 4],
}

/// Keep detections with `confidence >= threshold`; boundary-equal confidences
/// are included. A box with inverted corners is a model-output defect and
/// fails the whole call.
pub(crate) fn filter_detections(
    raw: Vec<RawDetection>,
    threshold: f64,
    classes: &[&str],
) -> Result<Vec<Detection>, InferenceError> {
    let mut detections = Vec::new();
    for row in raw {
        if row.confidence < threshold {
            continue;
        }
        let [x1, y1, x2, y2] = row.bbox;
        let bbox = BoundingBox::new(x1, y1, x2, y2)
            .map_err(|e| InferenceError::Output(e.to_string()))?;
        let class_name = classes
            .get(row.class_id as usize)
            .copied()
            .unwrap_or("unknown")
            .to_string();
        detections.push(Detection {
            class_id: row.class_id,
            class_name,
            confidence: row.confidence,
            bbox,
        });
    }
    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(confidence: f64) -> RawDetection {
        RawDetection {
            class_id: 0,
            confidence,
            bbox: [10.0, 20.0, 100.0, 200.0],
        }
    }

    #[test]
    fn filter_keeps_boundary_equal_confidence() {
        let rows = vec![raw(0.92), raw(0.4), raw(0.5)];
        let kept = filter_detections(rows, 0.5, COCO_CLASSES).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.92);
        assert_eq!(kept[1].confidence, 0.5);
    }

    #[test]
    fn filter_preserves_engine_order() {
        let mut low = raw(0.7);
        low.class_id = 2;
        let rows = vec![raw(0.6), low];
        let kept = filter_detections(rows, 0.5, COCO_CLASSES).unwrap();
        assert_eq!(kept[0].confidence, 0.6);
        assert_eq!(kept[1].class_name, "car");
    }

    #[test]
    fn filter_rejects_inverted_box() {
        let rows = vec![RawDetection {
            class_id: 0,
            confidence: 0.9,
            bbox: [100.0, 20.0, 10.0, 200.0],
        }];
        assert!(matches!(
            filter_detections(rows, 0.5, COCO_CLASSES),
            Err(InferenceError::Output(_))
        ));
    }

    #[test]
    fn filter_maps_unknown_class_id() {
        let rows = vec![RawDetection {
            class_id: 9999,
            confidence: 0.9,
            bbox: [0.0, 0.0, 1.0, 1.0],
        }];
        let kept = filter_detections(rows, 0.5, COCO_CLASSES).unwrap();
        assert_eq!(kept[0].class_name, "unknown");
    }

    #[test]
    fn filter_handles_empty_output() {
        let kept = filter_detections(Vec::new(), 0.5, COCO_CLASSES).unwrap();
        assert!(kept.is_empty());
    }
}
