use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_starred: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub custom_order: Option<i64>,
    /// Position of the task inside each group it belongs to, keyed by group id.
    #[serde(default)]
    pub group_order: BTreeMap<String, i64>,
    /// Unix epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub is_subtasks_open: bool,
}

impl Task {
    pub fn new(
        id: String,
        title: String,
        due_date: Option<OffsetDateTime>,
        is_starred: bool,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            title,
            due_date,
            is_completed: false,
            is_starred,
            created_at: Some(now),
            updated_at: Some(now),
            custom_order: None,
            group_order: BTreeMap::new(),
            completed_at: None,
            subtasks: Vec::new(),
            is_subtasks_open: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub custom_order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub task_ids: Vec<String>,
}

impl TaskGroup {
    pub fn contains(&self, task_id: &str) -> bool {
        self.task_ids.iter().any(|id| id == task_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEnvelope {
    pub version: u64,
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub task_groups: Vec<TaskGroup>,
}
