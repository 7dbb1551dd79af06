mod http_notifier;

pub use http_notifier::HttpCallbackNotifier;

use async_trait::async_trait;
use shared::DetectionResult;

/// Best-effort completion notification. Delivery failures are logged and
/// swallowed; a callback outage never fails a completed task.
#[async_trait]
pub trait CallbackNotifier: Send + Sync {
    async fn notify(&self, callback_url: Option<&str>, result: &DetectionResult);
}
