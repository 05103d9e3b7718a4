pub mod config;
pub mod due_date;
pub mod error;
pub mod ids;
pub mod model;
pub mod notify;
pub mod ordering;
pub mod storage;
pub mod task_api;
