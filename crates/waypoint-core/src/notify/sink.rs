//! NotificationSink trait definition.

use serde::{Deserialize, Serialize};
use waypoint_types::error::DeliveryError;

/// Acknowledgement returned by a sink after accepting a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Provider-assigned message ID, when the sink reports one.
    pub message_id: Option<String>,
}

/// Delivers rendered notifications (subject + body) to a named sink.
///
/// Implementations live in waypoint-infra (`LogSink`, `WebhookSink`).
pub trait NotificationSink: Send + Sync {
    fn send(
        &self,
        sink: &str,
        subject: &str,
        body: &str,
    ) -> impl std::future::Future<Output = Result<Ack, DeliveryError>> + Send;
}
