mod callback;
mod config;
mod detector;
mod pipeline;
mod queue;
mod status;
mod storage;

use std::sync::Arc;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use tokio::sync::watch;

use callback::HttpCallbackNotifier;
use config::WorkerConfig;
use detector::TorchDetector;
use pipeline::Pipeline;
use queue::TaskConsumer;
use status::DynamoStatusStore;
use storage::S3ImageStore;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    let config = WorkerConfig::from_env();

    let detector = match TorchDetector::load(
        &config.model_path,
        config.model_input_size,
        config.confidence_threshold,
    ) {
        Ok(detector) => detector,
        Err(e) => {
            log::error!("Failed to preload model at startup: {:?}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Model loading failed: {:?}", e),
            ));
        }
    };

    // Initialize AWS configuration
    let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let s3_client = S3Client::new(&aws_config);
    let dynamodb_client = DynamoDbClient::new(&aws_config);

    let image_store = S3ImageStore::new(s3_client, config.s3_bucket.clone());
    let status_store = DynamoStatusStore::new(
        dynamodb_client,
        config.tasks_table.clone(),
        Duration::from_secs(config.status_ttl_secs),
    );
    let notifier = HttpCallbackNotifier::new(
        config.callback_url.clone(),
        Duration::from_secs(config.callback_timeout_secs),
    )
    .map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("HTTP client construction failed: {}", e),
        )
    })?;

    let pipeline = Pipeline::new(
        Arc::new(image_store),
        Arc::new(detector),
        Arc::new(status_store),
        Arc::new(notifier),
    );

    let consumer = TaskConsumer::connect(&config.amqp_url, &config.queue_name)
        .await
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Broker connection failed: {}", e),
            )
        })?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    log::info!("Worker started, consuming from {}", config.queue_name);
    consumer
        .consume(&pipeline, shutdown_rx)
        .await
        .map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::Other, format!("Consumer error: {}", e))
        })?;

    log::info!("Worker stopped");
    Ok(())
}
