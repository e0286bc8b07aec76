//! Event distribution for workflow run observers.

pub mod bus;
