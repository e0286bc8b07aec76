//! Infrastructure layer for Waypoint.
//!
//! Contains the concrete collaborators behind the ports defined in
//! `waypoint-core`: subprocess and HTTP task executors, log and webhook
//! notification sinks, the TOML config loader, and the wiring that turns an
//! [`EngineConfig`](waypoint_types::config::EngineConfig) into registries.

pub mod config;
pub mod executor;
pub mod sink;
pub mod wiring;
