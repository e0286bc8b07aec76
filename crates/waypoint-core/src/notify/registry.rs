//! Sink registry: routes Notify states to sinks by name.

use std::collections::HashMap;

use waypoint_types::error::DeliveryError;

use super::box_sink::BoxNotificationSink;
use super::sink::{Ack, NotificationSink};

/// Name-indexed registry of boxed notification sinks.
pub struct SinkRegistry {
    sinks: HashMap<String, BoxNotificationSink>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self {
            sinks: HashMap::new(),
        }
    }

    /// Register a sink under the given name, replacing any existing one.
    pub fn register(&mut self, name: impl Into<String>, sink: BoxNotificationSink) {
        self.sinks.insert(name.into(), sink);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sinks.contains_key(name)
    }

    /// Registered sink names, sorted.
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sinks.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("sinks", &self.list_names())
            .finish()
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for SinkRegistry {
    async fn send(&self, sink: &str, subject: &str, body: &str) -> Result<Ack, DeliveryError> {
        match self.sinks.get(sink) {
            Some(found) => found.send(sink, subject, body).await,
            None => Err(DeliveryError::UnknownSink(sink.to_string())),
        }
    }
}
