use image::RgbImage;
use image::imageops::FilterType;
use log::info;
use shared::Detection;
use tch::{CModule, Device, Kind, Tensor};

use super::{COCO_CLASSES, DetectionEngine, InferenceError, RawDetection, filter_detections};

/// TorchScript detector. Expects the module to map a `[1, 3, s, s]` float
/// tensor in `[0, 1]` to `[n, 6]` rows of `(x1, y1, x2, y2, confidence,
/// class_id)` in input-pixel coordinates.
pub struct TorchDetector {
    module: CModule,
    device: Device,
    input_size: u32,
    confidence_threshold: f64,
}

impl TorchDetector {
    pub fn load(
        model_path: &str,
        input_size: u32,
        confidence_threshold: f64,
    ) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(model_path, device)?;
        info!("Loaded detection model {} on {:?}", model_path, device);
        Ok(Self {
            module,
            device,
            input_size,
            confidence_threshold,
        })
    }

    fn preprocess(&self, image: &RgbImage) -> Tensor {
        let size = self.input_size;
        let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
        let data: Vec<f32> = resized.into_raw().iter().map(|&v| v as f32 / 255.0).collect();
        Tensor::from_slice(&data)
            .view([size as i64, size as i64, 3])
            .permute([2, 0, 1])
            .unsqueeze(0)
            .to_device(self.device)
    }
}

impl DetectionEngine for TorchDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, InferenceError> {
        let input = self.preprocess(image);
        let output = self.module.forward_ts(&[input])?;
        let raw = parse_output(&output.to_device(Device::Cpu).to_kind(Kind::Float))?;
        filter_detections(raw, self.confidence_threshold, COCO_CLASSES)
    }
}

fn parse_output(output: &Tensor) -> Result<Vec<RawDetection>, InferenceError> {
    let dims = output.size();
    let (rows, cols) = match dims.as_slice() {
        [n, c] => (*n, *c),
        [1, n, c] => (*n, *c),
        _ => {
            return Err(InferenceError::Output(format!(
                "unexpected output shape {:?}",
                dims
            )));
        }
    };
    if cols < 6 {
        return Err(InferenceError::Output(format!(
            "expected at least 6 columns per detection, got {}",
            cols
        )));
    }

    let flat: Vec<f32> = output
        .contiguous()
        .view([-1])
        .try_into()
        .map_err(InferenceError::Model)?;

    let mut raw = Vec::with_capacity(rows as usize);
    for i in 0..rows as usize {
        let row = &flat[i * cols as usize..(i + 1) * cols as usize];
        raw.push(RawDetection {
            class_id: row[5] as i64,
            confidence: row[4] as f64,
            bbox: [row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64],
        });
    }
    Ok(raw)
}
