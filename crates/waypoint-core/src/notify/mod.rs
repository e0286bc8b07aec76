//! Notification sink port.
//!
//! Mirrors the executor port: `NotificationSink` is implemented by the
//! infrastructure layer, `BoxNotificationSink` erases it and `SinkRegistry`
//! routes Notify states to sinks by name.

pub mod box_sink;
pub mod registry;
pub mod sink;

pub use box_sink::BoxNotificationSink;
pub use registry::SinkRegistry;
pub use sink::{Ack, NotificationSink};
