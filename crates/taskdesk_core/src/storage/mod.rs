pub mod kv_store;
pub mod migrate;
pub mod task_store;
