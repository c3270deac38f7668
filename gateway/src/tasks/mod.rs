//! 任务接口

pub mod handlers;
pub mod model;
pub mod query;
pub mod repository;

pub use model::{Priority, Task, TaskStats};
pub use repository::{InMemoryTaskRepository, TaskRepository};
