//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): every failure a task can resolve to
//! - [`TaskState`](loadstate::TaskState): the per-task lifecycle

pub mod context;
pub mod loadstate;
pub mod neterror;
