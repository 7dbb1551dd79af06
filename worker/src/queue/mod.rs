mod consumer;

pub use consumer::{DecodeError, QueueError, TaskConsumer, decode_task};
