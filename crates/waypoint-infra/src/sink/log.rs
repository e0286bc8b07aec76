//! LogSink -- delivers notifications as structured log lines.

use waypoint_core::notify::{Ack, NotificationSink};
use waypoint_types::error::DeliveryError;

/// Sink that writes each notification through `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn send(&self, sink: &str, subject: &str, body: &str) -> Result<Ack, DeliveryError> {
        tracing::info!(sink, subject, body, "notification");
        Ok(Ack::default())
    }
}
