//! HTTP trigger for Waypoint.
//!
//! Axum-based API that runs served workflows on demand and reports the
//! `ExecutionResult` of each run.

pub mod error;
pub mod handlers;
pub mod router;
