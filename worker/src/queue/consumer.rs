use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use log::{error, info, warn};
use shared::TaskMessage;
use tokio::sync::watch;

use crate::pipeline::Pipeline;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("malformed task message: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

pub fn decode_task(payload: &[u8]) -> Result<TaskMessage, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}

pub struct TaskConsumer {
    channel: Channel,
    queue_name: String,
}

impl TaskConsumer {
    pub async fn connect(amqp_url: &str, queue_name: &str) -> Result<Self, QueueError> {
        let connection = Connection::connect(
            amqp_url,
            ConnectionProperties::default().with_connection_name("detection-worker".into()),
        )
        .await?;
        let channel = connection.create_channel().await?;

        // One undelivered message at a time; scale out by running more
        // worker instances, not by raising this.
        channel.basic_qos(1, BasicQosOptions::default()).await?;
        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        Ok(Self {
            channel,
            queue_name: queue_name.to_string(),
        })
    }

    /// Pull, decode, and process messages until `shutdown` flips. A delivery
    /// already in flight when the signal arrives finishes and is acked or
    /// nacked normally before this returns.
    pub async fn consume(
        &self,
        pipeline: &Pipeline,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), QueueError> {
        let mut consumer = self
            .channel
            .basic_consume(
                &self.queue_name,
                "detection-worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!("Consuming from queue {}", self.queue_name);

        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested, no longer pulling messages");
                return Ok(());
            }

            let delivery = tokio::select! {
                _ = shutdown.changed() => {
                    info!("Shutdown requested, no longer pulling messages");
                    return Ok(());
                }
                delivery = consumer.next() => match delivery {
                    Some(delivery) => delivery?,
                    None => {
                        warn!("Consumer stream closed by broker");
                        return Ok(());
                    }
                },
            };

            match decode_task(&delivery.data) {
                Ok(task) => match pipeline.execute(&task).await {
                    Ok(_) => {
                        delivery.acker.ack(BasicAckOptions::default()).await?;
                    }
                    Err(e) => {
                        error!("Task {} failed, requeueing: {}", task.task_id, e);
                        delivery
                            .acker
                            .nack(BasicNackOptions {
                                requeue: true,
                                ..Default::default()
                            })
                            .await?;
                    }
                },
                Err(e) => {
                    // Poison message: redelivery would fail the same way
                    // forever, so drop it instead of requeueing.
                    error!("Dropping malformed message: {}", e);
                    delivery.acker.ack(BasicAckOptions::default()).await?;
                }
            }
        }
    }
}
