use crate::error::{AppError, MigrationError};
use crate::ids::IdSource;
use crate::model::{StoreEnvelope, Task, TaskGroup};
use crate::notify::NotifiedState;
use crate::storage::kv_store::KeyValueStore;
use crate::storage::migrate::{CURRENT_VERSION, try_migrate};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, warn};

pub const TASKS_KEY: &str = "tasks";
pub const GROUPS_KEY: &str = "taskGroups";
pub const BACKUP_KEY: &str = "tasks.backup";
pub const NOTIFIED_KEY: &str = "notifiedTasks";

const DATE_FIELDS: [&str; 3] = ["dueDate", "createdAt", "updatedAt"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskState {
    pub tasks: Vec<Task>,
    pub task_groups: Vec<TaskGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub state: TaskState,
    /// Set when the stored tasks were unreadable and have been replaced by an empty list.
    pub reset: Option<MigrationError>,
    pub backed_up: bool,
}

/// Reads the stored tasks, upgrades them to the current schema and writes
/// the upgraded envelope straight back.
///
/// Anything other than a current-version blob is first copied to
/// [`BACKUP_KEY`]. A blob that cannot be read or upgraded is replaced by an
/// empty list rather than failing the load; only storage errors propagate.
pub fn load_state(
    store: &mut dyn KeyValueStore,
    ids: &mut dyn IdSource,
) -> Result<LoadOutcome, AppError> {
    let stored_groups = store.get(GROUPS_KEY)?;

    let Some(raw) = store.get(TASKS_KEY)? else {
        let task_groups = stored_groups
            .as_deref()
            .and_then(parse_groups)
            .unwrap_or_default();
        return Ok(LoadOutcome {
            state: TaskState {
                tasks: Vec::new(),
                task_groups,
            },
            reset: None,
            backed_up: false,
        });
    };

    let parsed = serde_json::from_str::<Value>(&raw)
        .map_err(|err| MigrationError::malformed(format!("stored tasks are not JSON: {err}")));
    let mut backed_up = !matches!(&parsed, Ok(value) if is_current(value));
    if backed_up {
        store.set(BACKUP_KEY, &raw)?;
    }

    let decoded = parsed
        .and_then(|value| try_migrate(value, ids))
        .and_then(decode_envelope);
    let (envelope, reset) = match decoded {
        Ok(envelope) => (envelope, None),
        Err(err) => {
            if !backed_up {
                store.set(BACKUP_KEY, &raw)?;
                backed_up = true;
            }
            error!(
                code = err.code(),
                error = %err,
                backup_key = BACKUP_KEY,
                "stored tasks discarded; the raw data is kept under the backup key"
            );
            (empty_envelope(), Some(err))
        }
    };

    let task_groups = match stored_groups.as_deref() {
        Some(raw_groups) => parse_groups(raw_groups).unwrap_or_else(|| envelope.task_groups.clone()),
        None => envelope.task_groups.clone(),
    };
    let state = TaskState {
        tasks: envelope.tasks,
        task_groups,
    };

    store.set(TASKS_KEY, &encode_envelope(&state)?)?;
    if stored_groups.is_none() {
        store.set(GROUPS_KEY, &encode_groups(&state.task_groups)?)?;
    }

    Ok(LoadOutcome {
        state,
        reset,
        backed_up,
    })
}

pub fn save_state(store: &mut dyn KeyValueStore, state: &TaskState) -> Result<(), AppError> {
    store.set(TASKS_KEY, &encode_envelope(state)?)?;
    store.set(GROUPS_KEY, &encode_groups(&state.task_groups)?)
}

pub fn load_notified(store: &dyn KeyValueStore) -> Result<NotifiedState, AppError> {
    let Some(raw) = store.get(NOTIFIED_KEY)? else {
        return Ok(NotifiedState::default());
    };
    match serde_json::from_str(&raw) {
        Ok(state) => Ok(state),
        Err(err) => {
            warn!(error = %err, "ignoring unreadable reminder state");
            Ok(NotifiedState::default())
        }
    }
}

pub fn save_notified(store: &mut dyn KeyValueStore, state: &NotifiedState) -> Result<(), AppError> {
    let content =
        serde_json::to_string(state).map_err(|err| AppError::invalid_data(err.to_string()))?;
    store.set(NOTIFIED_KEY, &content)
}

fn is_current(value: &Value) -> bool {
    value.get("version").and_then(Value::as_u64) == Some(CURRENT_VERSION)
}

fn empty_envelope() -> StoreEnvelope {
    StoreEnvelope {
        version: CURRENT_VERSION,
        tasks: Vec::new(),
        task_groups: Vec::new(),
    }
}

fn parse_groups(raw: &str) -> Option<Vec<TaskGroup>> {
    match serde_json::from_str(raw) {
        Ok(groups) => Some(groups),
        Err(err) => {
            warn!(error = %err, "ignoring unreadable task groups");
            None
        }
    }
}

fn encode_envelope(state: &TaskState) -> Result<String, AppError> {
    let envelope = StoreEnvelope {
        version: CURRENT_VERSION,
        tasks: state.tasks.clone(),
        task_groups: state.task_groups.clone(),
    };
    serde_json::to_string(&envelope).map_err(|err| AppError::invalid_data(err.to_string()))
}

fn encode_groups(groups: &[TaskGroup]) -> Result<String, AppError> {
    serde_json::to_string(groups).map_err(|err| AppError::invalid_data(err.to_string()))
}

/// Turns a migrated envelope into typed tasks. Dates that do not parse are dropped.
fn decode_envelope(mut value: Value) -> Result<StoreEnvelope, MigrationError> {
    if let Some(tasks) = value.get_mut("tasks").and_then(Value::as_array_mut) {
        for task in tasks.iter_mut().filter_map(Value::as_object_mut) {
            clear_bad_dates(task);
            if let Some(subtasks) = task.get_mut("subtasks").and_then(Value::as_array_mut) {
                for subtask in subtasks.iter_mut().filter_map(Value::as_object_mut) {
                    clear_bad_dates(subtask);
                }
            }
        }
    }

    serde_json::from_value(value)
        .map_err(|err| MigrationError::malformed(format!("stored tasks do not match schema: {err}")))
}

fn clear_bad_dates(object: &mut Map<String, Value>) {
    for field in DATE_FIELDS {
        let Some(value) = object.get_mut(field) else {
            continue;
        };
        let readable = match value {
            Value::Null => true,
            Value::String(text) => OffsetDateTime::parse(text, &Rfc3339).is_ok(),
            _ => false,
        };
        if !readable {
            warn!(field, value = %value, "dropping unreadable date");
            *value = Value::Null;
        }
    }
}
