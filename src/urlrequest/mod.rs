pub mod engine;
pub mod task;

pub use engine::{Engine, EngineConfig};
pub use task::{CallbackContext, Callbacks, TaskId};
