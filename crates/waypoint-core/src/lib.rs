//! Workflow engine core for Waypoint.
//!
//! This crate defines the collaborator "ports" (`TaskExecutor`,
//! `NotificationSink`) that the infrastructure layer implements, and the
//! engine that interprets workflow definitions against them. It depends only
//! on `waypoint-types` -- never on `waypoint-infra` or any network/process crate.

pub mod event;
pub mod executor;
pub mod notify;
pub mod workflow;
