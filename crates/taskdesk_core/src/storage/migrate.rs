//! Schema upgrades for the persisted task envelope.
//!
//! Stored blobs are upgraded one version at a time through a table of
//! `version -> upgrade` functions until they reach [`CURRENT_VERSION`]. The
//! upgrades work on raw JSON so fields this code does not know about survive.

use crate::error::MigrationError;
use crate::ids::{ClockIds, IdSource};
use serde_json::{Map, Value, json};
use tracing::{error, info};

pub const CURRENT_VERSION: u64 = 2;

type Envelope = Map<String, Value>;
type Migration = fn(Envelope, &mut dyn IdSource) -> Result<Envelope, MigrationError>;

const MIGRATIONS: &[(u64, Migration)] = &[(0, unversioned_to_v1), (1, v1_to_v2)];

fn migration_for(version: u64) -> Option<Migration> {
    MIGRATIONS
        .iter()
        .find(|(from, _)| *from == version)
        .map(|(_, step)| *step)
}

pub fn empty_envelope() -> Value {
    json!({
        "version": CURRENT_VERSION,
        "tasks": [],
        "taskGroups": []
    })
}

/// Upgrades `raw` to the current schema, replacing it with an empty envelope
/// when it cannot be upgraded.
pub fn migrate(raw: Value) -> Value {
    migrate_with_ids(raw, &mut ClockIds::new())
}

pub fn migrate_with_ids(raw: Value, ids: &mut dyn IdSource) -> Value {
    match try_migrate(raw, ids) {
        Ok(envelope) => envelope,
        Err(err) => {
            error!(
                code = err.code(),
                error = %err,
                "stored tasks could not be migrated; starting from an empty list"
            );
            empty_envelope()
        }
    }
}

pub fn try_migrate(raw: Value, ids: &mut dyn IdSource) -> Result<Value, MigrationError> {
    let mut envelope = versioned(raw)?;
    let mut version = read_version(&envelope)?;

    while version != CURRENT_VERSION {
        let step = migration_for(version).ok_or(MigrationError::MigrationGap { version })?;
        info!(from = version, to = version + 1, "migrating stored tasks");
        envelope = step(envelope, ids)?;
        version = read_version(&envelope)?;
    }

    apply_view_defaults(&mut envelope)?;
    Ok(Value::Object(envelope))
}

fn versioned(raw: Value) -> Result<Envelope, MigrationError> {
    match raw {
        Value::Array(tasks) => Ok(unversioned(Value::Array(tasks))),
        Value::Object(mut object) => {
            let numeric = match object.get("version") {
                Some(Value::String(text)) => text.parse::<u64>().ok(),
                _ => None,
            };
            if let Some(version) = numeric {
                object.insert("version".to_string(), json!(version));
            }
            let has_version = match object.get("version") {
                None | Some(Value::Null) | Some(Value::Bool(false)) => false,
                Some(Value::Number(number)) => number.as_u64() != Some(0),
                Some(Value::String(text)) => !text.is_empty(),
                Some(_) => true,
            };
            if has_version {
                Ok(object)
            } else {
                let tasks = object.remove("tasks").unwrap_or(Value::Null);
                Ok(unversioned(tasks))
            }
        }
        other => Err(MigrationError::malformed(format!(
            "expected a task list or envelope, found {}",
            kind(&other)
        ))),
    }
}

fn unversioned(tasks: Value) -> Envelope {
    let mut envelope = Map::new();
    envelope.insert("version".to_string(), json!(0));
    envelope.insert("tasks".to_string(), tasks);
    envelope
}

fn read_version(envelope: &Envelope) -> Result<u64, MigrationError> {
    envelope
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| MigrationError::malformed("version must be a non-negative integer"))
}

fn unversioned_to_v1(
    mut envelope: Envelope,
    ids: &mut dyn IdSource,
) -> Result<Envelope, MigrationError> {
    for task in list_mut(&mut envelope, "tasks")? {
        let task = object_mut(task, "task")?;
        let task_id = match task.get("id").and_then(present_id) {
            Some(id) => id,
            None => ids.next_id(),
        };
        task.insert("id".to_string(), Value::String(task_id.clone()));
        task.entry("customOrder").or_insert(Value::Null);

        for subtask in list_mut(task, "subtasks")? {
            let subtask = object_mut(subtask, "subtask")?;
            let subtask_id = match subtask.get("id").and_then(present_id) {
                Some(id) => id,
                None => ids.next_id(),
            };
            subtask.insert("id".to_string(), Value::String(subtask_id));
            subtask.insert("parentId".to_string(), Value::String(task_id.clone()));
        }
    }

    envelope.insert("version".to_string(), json!(1));
    Ok(envelope)
}

fn v1_to_v2(mut envelope: Envelope, _ids: &mut dyn IdSource) -> Result<Envelope, MigrationError> {
    for task in list_mut(&mut envelope, "tasks")? {
        let task = object_mut(task, "task")?;
        if !task.get("groupOrder").is_some_and(Value::is_object) {
            task.insert("groupOrder".to_string(), json!({}));
        }

        for subtask in list_mut(task, "subtasks")? {
            object_mut(subtask, "subtask")?
                .entry("customOrder")
                .or_insert(Value::Null);
        }
    }

    envelope.insert("taskGroups".to_string(), json!([]));
    envelope.insert("version".to_string(), json!(2));
    Ok(envelope)
}

/// Presentation defaults applied after every load, whatever the stored version.
fn apply_view_defaults(envelope: &mut Envelope) -> Result<(), MigrationError> {
    for task in list_mut(envelope, "tasks")? {
        let task = object_mut(task, "task")?;
        let open = matches!(task.get("isSubtasksOpen"), Some(Value::Bool(true)));
        task.insert("isSubtasksOpen".to_string(), Value::Bool(open));
    }
    list_mut(envelope, "taskGroups")?;
    Ok(())
}

/// The array stored under `key`, created empty when absent or null.
fn list_mut<'a>(
    object: &'a mut Map<String, Value>,
    key: &str,
) -> Result<&'a mut Vec<Value>, MigrationError> {
    let slot = object.entry(key).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => Ok(items),
        other => Err(MigrationError::malformed(format!(
            "{key} must be an array, found {}",
            kind(other)
        ))),
    }
}

fn object_mut<'a>(
    value: &'a mut Value,
    what: &str,
) -> Result<&'a mut Map<String, Value>, MigrationError> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(MigrationError::malformed(format!(
            "{what} must be an object, found {}",
            kind(other)
        ))),
    }
}

fn present_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) if id.as_f64() != Some(0.0) => Some(id.to_string()),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
