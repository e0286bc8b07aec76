//! Task executor port.
//!
//! `TaskExecutor` is the seam between the engine and whatever actually does
//! the work of a Task state. `BoxTaskExecutor` erases the concrete type and
//! `ExecutorRegistry` routes by executor name.

pub mod box_executor;
pub mod registry;
pub mod task;

pub use box_executor::BoxTaskExecutor;
pub use registry::ExecutorRegistry;
pub use task::TaskExecutor;
