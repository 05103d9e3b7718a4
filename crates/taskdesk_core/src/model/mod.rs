mod task;

pub use task::{StoreEnvelope, Subtask, Task, TaskGroup};
