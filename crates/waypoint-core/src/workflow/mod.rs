//! Workflow engine core: definition loading, validation, and execution.
//!
//! - `definition` -- YAML/JSON parsing, structural validation, `Workflow` handle
//! - `graph` -- start resolution, dangling references, cycle and reachability analysis
//! - `context` -- JSON execution context with `$.a.b[0]` paths and templating
//! - `retry` -- error-kind matching and exponential backoff
//! - `catch` -- first-match-wins catch resolution
//! - `engine` -- the state machine driver, parallel fan-out/join, cancellation

pub mod catch;
pub mod context;
pub mod definition;
pub mod engine;
pub mod graph;
pub mod retry;
