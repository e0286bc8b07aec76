//! Shared domain types for Waypoint.
//!
//! This crate contains the workflow definition IR (states, retry and catch
//! policies), run results, engine events, engine configuration, and the error
//! types exchanged with task executors and notification sinks.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod workflow;
