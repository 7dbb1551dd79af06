use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use image::RgbImage;
use log::debug;
use shared::DetectionResult;

use super::{ImageStore, ImageStoreError};

#[derive(Clone)]
pub struct S3ImageStore {
    client: Client,
    bucket_name: String,
}

impl S3ImageStore {
    pub fn new(client: Client, bucket_name: String) -> Self {
        Self {
            client,
            bucket_name,
        }
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn retrieve_image(&self, key: &str) -> Result<RgbImage, ImageStoreError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    ImageStoreError::NotFound(key.to_string())
                } else {
                    ImageStoreError::Storage(e.to_string())
                }
            })?;

        let body = result
            .body
            .collect()
            .await
            .map_err(|e| ImageStoreError::Storage(e.to_string()))?;

        let image = image::load_from_memory(&body.into_bytes())
            .map_err(|e| ImageStoreError::Decode(key.to_string(), e.to_string()))?;

        debug!("Retrieved image {} from bucket {}", key, self.bucket_name);
        Ok(image.to_rgb8())
    }

    async fn store_result(
        &self,
        key: &str,
        result: &DetectionResult,
    ) -> Result<(), ImageStoreError> {
        let json = serde_json::to_vec_pretty(result)
            .map_err(|e| ImageStoreError::Storage(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .body(ByteStream::from(json))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| ImageStoreError::Storage(e.to_string()))?;

        debug!("Stored result at {} in bucket {}", key, self.bucket_name);
        Ok(())
    }
}
