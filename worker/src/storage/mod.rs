mod s3_image_store;

pub use s3_image_store::S3ImageStore;

use async_trait::async_trait;
use image::RgbImage;
use shared::DetectionResult;

#[derive(Debug, thiserror::Error)]
pub enum ImageStoreError {
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("failed to decode image {0}: {1}")]
    Decode(String, String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Blob storage port: raw images in, result documents out.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Fetch and decode the image at `key` into 3-channel RGB, whatever the
    /// source encoding.
    async fn retrieve_image(&self, key: &str) -> Result<RgbImage, ImageStoreError>;

    /// Write the serialized result at `key`, overwriting any existing object.
    async fn store_result(&self, key: &str, result: &DetectionResult)
    -> Result<(), ImageStoreError>;
}
