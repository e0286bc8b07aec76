//! BoxNotificationSink -- object-safe wrapper for NotificationSink.

use std::future::Future;
use std::pin::Pin;

use waypoint_types::error::DeliveryError;

use super::sink::{Ack, NotificationSink};

/// Object-safe version of [`NotificationSink`] with boxed futures.
pub trait NotificationSinkDyn: Send + Sync {
    fn send_boxed<'a>(
        &'a self,
        sink: &'a str,
        subject: &'a str,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Ack, DeliveryError>> + Send + 'a>>;
}

impl<T: NotificationSink> NotificationSinkDyn for T {
    fn send_boxed<'a>(
        &'a self,
        sink: &'a str,
        subject: &'a str,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Ack, DeliveryError>> + Send + 'a>> {
        Box::pin(self.send(sink, subject, body))
    }
}

/// Type-erased notification sink.
pub struct BoxNotificationSink {
    inner: Box<dyn NotificationSinkDyn + Send + Sync>,
}

impl BoxNotificationSink {
    pub fn new<T: NotificationSink + 'static>(sink: T) -> Self {
        Self {
            inner: Box::new(sink),
        }
    }

    pub async fn send(&self, sink: &str, subject: &str, body: &str) -> Result<Ack, DeliveryError> {
        self.inner.send_boxed(sink, subject, body).await
    }
}

impl std::fmt::Debug for BoxNotificationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxNotificationSink").finish_non_exhaustive()
    }
}
