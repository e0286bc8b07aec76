//! Concrete notification sinks.

pub mod log;
pub mod webhook;

pub use log::LogSink;
pub use webhook::{SIGNATURE_HEADER, WebhookSink, sign_payload};
