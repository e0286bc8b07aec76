//! Concrete task executors.

pub mod command;
pub mod http;

pub use command::CommandExecutor;
pub use http::HttpExecutor;
