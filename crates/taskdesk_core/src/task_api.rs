use crate::config::Settings;
use crate::due_date;
use crate::error::AppError;
use crate::ids::{ClockIds, IdSource};
use crate::model::{Subtask, Task, TaskGroup};
use crate::notify::{self, NotificationOutcome, Notifier};
use crate::ordering::{self, SortOrder};
use crate::storage::kv_store::{FileStore, KeyValueStore};
use crate::storage::task_store::{self, LoadOutcome, TaskState};
use time::{Date, OffsetDateTime};
use tracing::{debug, info, warn};

/// Fields to change on a task. `None` leaves the field untouched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskEdit {
    pub title: Option<String>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<OffsetDateTime>>,
    pub is_starred: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubtaskEdit {
    pub title: Option<String>,
    pub due_date: Option<Option<OffsetDateTime>>,
}

pub fn load_tasks() -> Result<LoadOutcome, AppError> {
    let mut store = FileStore::open_default()?;
    task_store::load_state(&mut store, &mut ClockIds::new())
}

pub fn list_tasks(settings: &Settings) -> Result<Vec<Task>, AppError> {
    let state = load_tasks()?.state;
    Ok(visible_tasks(&state, settings))
}

pub fn list_groups() -> Result<Vec<TaskGroup>, AppError> {
    Ok(load_tasks()?.state.task_groups)
}

pub fn get_task(id: &str) -> Result<Task, AppError> {
    let state = load_tasks()?.state;
    find_task(&state, id).cloned()
}

pub fn add_task(settings: &Settings, title: &str, starred: bool) -> Result<Task, AppError> {
    let today = due_date::local_today();
    update_default(settings, |state, ids| {
        add_task_in(
            state,
            ids,
            OffsetDateTime::now_utc(),
            today,
            title,
            starred,
            settings.sort_order,
        )
    })
}

pub fn edit_task(settings: &Settings, id: &str, edit: TaskEdit) -> Result<Task, AppError> {
    update_default(settings, |state, _| {
        edit_task_in(state, OffsetDateTime::now_utc(), id, edit)
    })
}

pub fn delete_task(settings: &Settings, id: &str) -> Result<Task, AppError> {
    update_default(settings, |state, _| delete_task_in(state, id))
}

pub fn toggle_star(settings: &Settings, id: &str) -> Result<Task, AppError> {
    update_default(settings, |state, _| {
        toggle_star_in(state, OffsetDateTime::now_utc(), id)
    })
}

pub fn toggle_complete(settings: &Settings, id: &str) -> Result<Task, AppError> {
    update_default(settings, |state, ids| {
        toggle_complete_in(
            state,
            ids,
            OffsetDateTime::now_utc(),
            id,
            settings.sort_order,
        )
    })
}

pub fn toggle_subtasks_open(settings: &Settings, id: &str) -> Result<Task, AppError> {
    update_default(settings, |state, _| toggle_subtasks_open_in(state, id))
}

pub fn add_subtask(
    settings: &Settings,
    task_id: &str,
    title: &str,
    due: Option<OffsetDateTime>,
) -> Result<Subtask, AppError> {
    let today = due_date::local_today();
    update_default(settings, |state, ids| {
        add_subtask_in(state, ids, today, task_id, title, due)
    })
}

pub fn edit_subtask(
    settings: &Settings,
    task_id: &str,
    subtask_id: &str,
    edit: SubtaskEdit,
) -> Result<Subtask, AppError> {
    update_default(settings, |state, _| {
        edit_subtask_in(state, task_id, subtask_id, edit)
    })
}

pub fn toggle_subtask_complete(
    settings: &Settings,
    task_id: &str,
    subtask_id: &str,
) -> Result<Subtask, AppError> {
    update_default(settings, |state, _| {
        toggle_subtask_complete_in(state, task_id, subtask_id)
    })
}

pub fn delete_subtask(
    settings: &Settings,
    task_id: &str,
    subtask_id: &str,
) -> Result<Subtask, AppError> {
    update_default(settings, |state, _| {
        delete_subtask_in(state, task_id, subtask_id)
    })
}

pub fn reorder_subtasks(
    settings: &Settings,
    task_id: &str,
    from: usize,
    to: usize,
) -> Result<Vec<Subtask>, AppError> {
    update_default(settings, |state, _| {
        reorder_subtasks_in(state, task_id, from, to)
    })
}

pub fn reorder_tasks(settings: &Settings, from: usize, to: usize) -> Result<Vec<Task>, AppError> {
    update_default(settings, |state, _| reorder_tasks_in(state, from, to))
}

pub fn create_group(settings: &Settings, task_ids: &[String]) -> Result<TaskGroup, AppError> {
    update_default(settings, |state, ids| create_group_in(state, ids, task_ids))
}

pub fn rename_group(settings: &Settings, group_id: &str, name: &str) -> Result<TaskGroup, AppError> {
    update_default(settings, |state, _| rename_group_in(state, group_id, name))
}

pub fn add_task_to_group(
    settings: &Settings,
    group_id: &str,
    task_id: &str,
) -> Result<TaskGroup, AppError> {
    update_default(settings, |state, _| {
        add_task_to_group_in(state, group_id, task_id)
    })
}

pub fn remove_task_from_group(
    settings: &Settings,
    group_id: &str,
    task_id: &str,
) -> Result<TaskGroup, AppError> {
    update_default(settings, |state, _| {
        remove_task_from_group_in(state, group_id, task_id)
    })
}

pub fn delete_group(settings: &Settings, group_id: &str) -> Result<TaskGroup, AppError> {
    update_default(settings, |state, _| delete_group_in(state, group_id))
}

/// Runs the due-soon check against the stored tasks and persists which
/// reminders were delivered.
pub fn notify_due_tasks(
    settings: &Settings,
    notifier: &dyn Notifier,
) -> Result<NotificationOutcome, AppError> {
    let mut store = FileStore::open_default()?;
    notify_due_tasks_with_store(
        &mut store,
        settings,
        &mut ClockIds::new(),
        OffsetDateTime::now_utc(),
        notifier,
    )
}

fn notify_due_tasks_with_store(
    store: &mut dyn KeyValueStore,
    settings: &Settings,
    ids: &mut dyn IdSource,
    now: OffsetDateTime,
    notifier: &dyn Notifier,
) -> Result<NotificationOutcome, AppError> {
    let tasks = task_store::load_state(store, ids)?.state.tasks;
    let previous = task_store::load_notified(store)?;

    if !settings.notifications_enabled {
        debug!("notifications are disabled; skipping due-soon check");
        return Ok(NotificationOutcome {
            delivered: Vec::new(),
            failures: Vec::new(),
            state: previous,
        });
    }

    let outcome = notify::deliver_due_alerts(
        &tasks,
        now,
        &settings.notification_thresholds,
        previous,
        notifier,
    );
    for failure in &outcome.failures {
        warn!(task_id = %failure.task_id, error = %failure.error, "reminder not delivered");
    }
    task_store::save_notified(store, &outcome.state)?;
    Ok(outcome)
}

/// Tasks in the configured order, without completed ones unless they are shown.
pub fn visible_tasks(state: &TaskState, settings: &Settings) -> Vec<Task> {
    let mut tasks = ordering::sorted(&state.tasks, settings.sort_order);
    if !settings.show_completed_tasks {
        tasks.retain(|task| !task.is_completed);
    }
    tasks
}

pub fn group_of<'a>(state: &'a TaskState, task_id: &str) -> Option<&'a TaskGroup> {
    state
        .task_groups
        .iter()
        .find(|group| group.contains(task_id.trim()))
}

fn update_default<T, F>(settings: &Settings, change: F) -> Result<T, AppError>
where
    F: FnOnce(&mut TaskState, &mut dyn IdSource) -> Result<T, AppError>,
{
    let mut store = FileStore::open_default()?;
    update(&mut store, settings, &mut ClockIds::new(), change)
}

/// Loads the state, applies `change` and saves the result when auto-save is on.
/// Nothing is written when `change` fails.
fn update<T, F>(
    store: &mut dyn KeyValueStore,
    settings: &Settings,
    ids: &mut dyn IdSource,
    change: F,
) -> Result<T, AppError>
where
    F: FnOnce(&mut TaskState, &mut dyn IdSource) -> Result<T, AppError>,
{
    let mut state = task_store::load_state(store, ids)?.state;
    let result = change(&mut state, ids)?;
    if settings.auto_save {
        task_store::save_state(store, &state)?;
    } else {
        debug!("auto-save is off; change kept in memory only");
    }
    Ok(result)
}

fn required_id(id: &str) -> Result<&str, AppError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }
    Ok(trimmed)
}

fn required_text<'a>(value: &'a str, what: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input(format!("{what} is required")));
    }
    Ok(trimmed)
}

fn find_task<'a>(state: &'a TaskState, id: &str) -> Result<&'a Task, AppError> {
    let id = required_id(id)?;
    state
        .tasks
        .iter()
        .find(|task| task.id == id)
        .ok_or_else(|| AppError::invalid_input("task not found"))
}

fn find_task_mut<'a>(state: &'a mut TaskState, id: &str) -> Result<&'a mut Task, AppError> {
    let id = required_id(id)?;
    state
        .tasks
        .iter_mut()
        .find(|task| task.id == id)
        .ok_or_else(|| AppError::invalid_input("task not found"))
}

fn find_subtask_mut<'a>(task: &'a mut Task, subtask_id: &str) -> Result<&'a mut Subtask, AppError> {
    let subtask_id = required_id(subtask_id)?;
    task.subtasks
        .iter_mut()
        .find(|subtask| subtask.id == subtask_id)
        .ok_or_else(|| AppError::invalid_input("subtask not found"))
}

fn find_group_mut<'a>(
    state: &'a mut TaskState,
    group_id: &str,
) -> Result<&'a mut TaskGroup, AppError> {
    let group_id = required_id(group_id)?;
    state
        .task_groups
        .iter_mut()
        .find(|group| group.id == group_id)
        .ok_or_else(|| AppError::invalid_input("group not found"))
}

fn epoch_millis(at: OffsetDateTime) -> i64 {
    at.unix_timestamp() * 1000 + i64::from(at.millisecond())
}

/// Title with any date reference removed, plus the date it named. A title
/// that is nothing but a date reference is kept as typed.
fn title_and_due(title: &str, today: Date) -> (String, Option<OffsetDateTime>) {
    let stripped = due_date::strip_date_reference_on(title, today);
    let due = stripped.due_date.map(due_date::due_at_midnight);
    if stripped.cleaned_text.is_empty() {
        (title.to_string(), due)
    } else {
        (stripped.cleaned_text, due)
    }
}

fn add_task_in(
    state: &mut TaskState,
    ids: &mut dyn IdSource,
    now: OffsetDateTime,
    today: Date,
    title: &str,
    starred: bool,
    sort: SortOrder,
) -> Result<Task, AppError> {
    let title = required_text(title, "title")?;
    let (title, due) = title_and_due(title, today);

    let mut task = Task::new(ids.next_id(), title, due, starred, now);
    if sort == SortOrder::Custom {
        let lowest = ordering::lowest_custom_order(&state.tasks, |_| true);
        task.custom_order = Some(lowest.saturating_sub(10));
    }

    state.tasks.insert(0, task.clone());
    info!(task_id = %task.id, due = ?task.due_date, "task added");
    Ok(task)
}

fn edit_task_in(
    state: &mut TaskState,
    now: OffsetDateTime,
    id: &str,
    edit: TaskEdit,
) -> Result<Task, AppError> {
    let title = edit
        .title
        .as_deref()
        .map(|title| required_text(title, "title"))
        .transpose()?
        .map(str::to_string);

    let task = find_task_mut(state, id)?;
    if let Some(title) = title {
        task.title = title;
    }
    if let Some(due) = edit.due_date {
        task.due_date = due;
    }
    if let Some(starred) = edit.is_starred {
        task.is_starred = starred;
    }
    task.updated_at = Some(now);
    Ok(task.clone())
}

fn delete_task_in(state: &mut TaskState, id: &str) -> Result<Task, AppError> {
    let id = required_id(id)?;
    let index = state
        .tasks
        .iter()
        .position(|task| task.id == id)
        .ok_or_else(|| AppError::invalid_input("task not found"))?;

    let removed = state.tasks.remove(index);
    for group in &mut state.task_groups {
        group.task_ids.retain(|member| member != id);
    }
    sync_group_order(state);
    info!(task_id = %removed.id, "task deleted");
    Ok(removed)
}

fn toggle_star_in(state: &mut TaskState, now: OffsetDateTime, id: &str) -> Result<Task, AppError> {
    let task = find_task_mut(state, id)?;
    task.is_starred = !task.is_starred;
    task.updated_at = Some(now);
    Ok(task.clone())
}

/// Completing stamps `completed_at` in place. Reopening issues a fresh id so
/// the task counts as the newest one, moves it to the front and, in custom
/// order, places it above every other open task.
fn toggle_complete_in(
    state: &mut TaskState,
    ids: &mut dyn IdSource,
    now: OffsetDateTime,
    id: &str,
    sort: SortOrder,
) -> Result<Task, AppError> {
    let id = required_id(id)?;
    let index = state
        .tasks
        .iter()
        .position(|task| task.id == id)
        .ok_or_else(|| AppError::invalid_input("task not found"))?;

    if !state.tasks[index].is_completed {
        let task = &mut state.tasks[index];
        task.is_completed = true;
        task.completed_at = Some(epoch_millis(now));
        task.updated_at = Some(now);
        return Ok(task.clone());
    }

    let lowest_open = ordering::lowest_custom_order(&state.tasks, |task| !task.is_completed);
    let mut task = state.tasks.remove(index);
    let new_id = ids.next_id();

    for member in state
        .task_groups
        .iter_mut()
        .flat_map(|group| group.task_ids.iter_mut())
    {
        if *member == task.id {
            *member = new_id.clone();
        }
    }
    for subtask in &mut task.subtasks {
        subtask.parent_id = new_id.clone();
    }

    debug!(old_id = %task.id, new_id = %new_id, "task reopened");
    task.id = new_id;
    task.is_completed = false;
    task.completed_at = None;
    task.updated_at = Some(now);
    if sort == SortOrder::Custom {
        task.custom_order = Some(lowest_open.saturating_sub(1));
    }

    state.tasks.insert(0, task.clone());
    Ok(task)
}

fn toggle_subtasks_open_in(state: &mut TaskState, id: &str) -> Result<Task, AppError> {
    let task = find_task_mut(state, id)?;
    task.is_subtasks_open = !task.is_subtasks_open;
    Ok(task.clone())
}

fn add_subtask_in(
    state: &mut TaskState,
    ids: &mut dyn IdSource,
    today: Date,
    task_id: &str,
    title: &str,
    due: Option<OffsetDateTime>,
) -> Result<Subtask, AppError> {
    let title = required_text(title, "title")?;
    let (title, parsed_due) = title_and_due(title, today);
    let parent = find_task_mut(state, task_id)?;

    let subtask = Subtask {
        id: ids.next_id(),
        title,
        due_date: due.or(parsed_due),
        is_completed: false,
        parent_id: parent.id.clone(),
        custom_order: None,
    };
    parent.subtasks.push(subtask.clone());
    Ok(subtask)
}

fn edit_subtask_in(
    state: &mut TaskState,
    task_id: &str,
    subtask_id: &str,
    edit: SubtaskEdit,
) -> Result<Subtask, AppError> {
    let title = edit
        .title
        .as_deref()
        .map(|title| required_text(title, "title"))
        .transpose()?
        .map(str::to_string);

    let subtask = find_subtask_mut(find_task_mut(state, task_id)?, subtask_id)?;
    if let Some(title) = title {
        subtask.title = title;
    }
    if let Some(due) = edit.due_date {
        subtask.due_date = due;
    }
    Ok(subtask.clone())
}

fn toggle_subtask_complete_in(
    state: &mut TaskState,
    task_id: &str,
    subtask_id: &str,
) -> Result<Subtask, AppError> {
    let subtask = find_subtask_mut(find_task_mut(state, task_id)?, subtask_id)?;
    subtask.is_completed = !subtask.is_completed;
    Ok(subtask.clone())
}

fn delete_subtask_in(
    state: &mut TaskState,
    task_id: &str,
    subtask_id: &str,
) -> Result<Subtask, AppError> {
    let subtask_id = required_id(subtask_id)?;
    let task = find_task_mut(state, task_id)?;
    let index = task
        .subtasks
        .iter()
        .position(|subtask| subtask.id == subtask_id)
        .ok_or_else(|| AppError::invalid_input("subtask not found"))?;
    Ok(task.subtasks.remove(index))
}

fn reorder_subtasks_in(
    state: &mut TaskState,
    task_id: &str,
    from: usize,
    to: usize,
) -> Result<Vec<Subtask>, AppError> {
    let task = find_task_mut(state, task_id)?;
    ordering::move_item(&mut task.subtasks, from, to)?;
    for (index, subtask) in task.subtasks.iter_mut().enumerate() {
        subtask.custom_order = Some(index as i64);
    }
    Ok(task.subtasks.clone())
}

/// Moves an open task within the custom order. Positions count open tasks
/// only, as they appear in custom order; completed tasks keep their place
/// after them.
fn reorder_tasks_in(state: &mut TaskState, from: usize, to: usize) -> Result<Vec<Task>, AppError> {
    let mut open = ordering::sorted(&state.tasks, SortOrder::Custom);
    open.retain(|task| !task.is_completed);
    ordering::move_item(&mut open, from, to)?;
    for (index, task) in open.iter_mut().enumerate() {
        task.custom_order = Some(index as i64);
    }

    let reordered = open.clone();
    open.extend(state.tasks.iter().filter(|task| task.is_completed).cloned());
    state.tasks = open;
    Ok(reordered)
}

fn create_group_in(
    state: &mut TaskState,
    ids: &mut dyn IdSource,
    task_ids: &[String],
) -> Result<TaskGroup, AppError> {
    if task_ids.is_empty() {
        return Err(AppError::invalid_input("at least one task is required"));
    }

    let mut members: Vec<String> = Vec::with_capacity(task_ids.len());
    for id in task_ids {
        let id = find_task(state, id)?.id.clone();
        if !members.contains(&id) {
            members.push(id);
        }
    }

    let group = TaskGroup {
        id: ids.next_id(),
        name: format!("Group {}", state.task_groups.len() + 1),
        task_ids: Vec::new(),
    };
    let group_id = group.id.clone();
    state.task_groups.push(group);
    for member in &members {
        join_group(state, &group_id, member);
    }

    info!(group_id = %group_id, size = members.len(), "group created");
    Ok(find_group_mut(state, &group_id)?.clone())
}

fn rename_group_in(state: &mut TaskState, group_id: &str, name: &str) -> Result<TaskGroup, AppError> {
    let name = required_text(name, "name")?;
    let group = find_group_mut(state, group_id)?;
    group.name = name.to_string();
    Ok(group.clone())
}

fn add_task_to_group_in(
    state: &mut TaskState,
    group_id: &str,
    task_id: &str,
) -> Result<TaskGroup, AppError> {
    let task_id = find_task(state, task_id)?.id.clone();
    let group_id = find_group_mut(state, group_id)?.id.clone();
    join_group(state, &group_id, &task_id);
    Ok(find_group_mut(state, &group_id)?.clone())
}

/// Takes a task out of a group. The group stays even when it becomes small or empty.
fn remove_task_from_group_in(
    state: &mut TaskState,
    group_id: &str,
    task_id: &str,
) -> Result<TaskGroup, AppError> {
    let task_id = required_id(task_id)?;
    let group = find_group_mut(state, group_id)?;
    if !group.contains(task_id) {
        return Err(AppError::invalid_input("task is not in this group"));
    }
    group.task_ids.retain(|member| member != task_id);
    let group = group.clone();
    sync_group_order(state);
    Ok(group)
}

/// Removes the group only; its tasks stay in the list.
fn delete_group_in(state: &mut TaskState, group_id: &str) -> Result<TaskGroup, AppError> {
    let group_id = required_id(group_id)?;
    let index = state
        .task_groups
        .iter()
        .position(|group| group.id == group_id)
        .ok_or_else(|| AppError::invalid_input("group not found"))?;

    let removed = state.task_groups.remove(index);
    sync_group_order(state);
    info!(group_id = %removed.id, "group deleted");
    Ok(removed)
}

/// A task belongs to at most one group; joining one leaves any other.
fn join_group(state: &mut TaskState, group_id: &str, task_id: &str) {
    for group in &mut state.task_groups {
        if group.id == group_id {
            if !group.contains(task_id) {
                group.task_ids.push(task_id.to_string());
            }
        } else {
            group.task_ids.retain(|member| member != task_id);
        }
    }
    sync_group_order(state);
}

/// Rebuilds every task's `group_order` from the groups' member lists.
fn sync_group_order(state: &mut TaskState) {
    for task in &mut state.tasks {
        task.group_order.clear();
        for group in &state.task_groups {
            if let Some(position) = group.task_ids.iter().position(|member| *member == task.id) {
                task.group_order.insert(group.id.clone(), position as i64);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::notify::DueAlert;
    use crate::storage::kv_store::MemoryStore;
    use crate::storage::task_store::{NOTIFIED_KEY, TASKS_KEY};
    use std::cell::RefCell;
    use time::Duration;
    use time::macros::{date, datetime};

    const NOW: OffsetDateTime = datetime!(2026-10-19 12:00 UTC);
    // A Monday.
    const TODAY: Date = date!(2026-10-19);

    fn task(id: &str, title: &str) -> Task {
        Task::new(id.to_string(), title.to_string(), None, false, NOW)
    }

    fn state_of(tasks: Vec<Task>) -> TaskState {
        TaskState {
            tasks,
            task_groups: Vec::new(),
        }
    }

    fn ids_of(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.id.as_str()).collect()
    }

    fn add(state: &mut TaskState, ids: &mut SequentialIds, title: &str) -> Result<Task, AppError> {
        add_task_in(state, ids, NOW, TODAY, title, false, SortOrder::Recent)
    }

    #[test]
    fn add_task_strips_date_reference_from_title() {
        let mut state = state_of(vec![task("1", "older")]);
        let mut ids = SequentialIds::starting_at(100);

        let added = add(&mut state, &mut ids, "  Pay rent 10/21 ").unwrap();

        assert_eq!(added.id, "100");
        assert_eq!(added.title, "Pay rent");
        assert_eq!(added.due_date.map(|due| due.date()), Some(date!(2026-10-21)));
        assert!(!added.is_subtasks_open);
        assert_eq!(ids_of(&state.tasks), vec!["100", "1"]);
    }

    #[test]
    fn add_task_keeps_title_that_is_only_a_date() {
        let mut state = TaskState::default();
        let added = add(&mut state, &mut SequentialIds::starting_at(1), "Friday").unwrap();

        assert_eq!(added.title, "Friday");
        assert_eq!(added.due_date.map(|due| due.date()), Some(date!(2026-10-23)));
    }

    #[test]
    fn add_task_without_date_reference_has_no_due_date() {
        let mut state = TaskState::default();
        let added = add(&mut state, &mut SequentialIds::starting_at(1), "Buy groceries tod").unwrap();

        assert_eq!(added.title, "Buy groceries tod");
        assert_eq!(added.due_date, None);
    }

    #[test]
    fn add_task_rejects_blank_title() {
        let mut state = TaskState::default();
        let err = add(&mut state, &mut SequentialIds::starting_at(1), "   ").unwrap_err();

        assert_eq!(err.code(), "invalid_input");
        assert_eq!(err.message(), "title is required");
        assert!(state.tasks.is_empty());
    }

    #[test]
    fn add_task_in_custom_order_goes_above_everything() {
        let mut placed = task("1", "placed");
        placed.custom_order = Some(3);
        let mut top = task("2", "top");
        top.custom_order = Some(-2);
        let mut state = state_of(vec![placed, top]);

        let added = add_task_in(
            &mut state,
            &mut SequentialIds::starting_at(10),
            NOW,
            TODAY,
            "new",
            true,
            SortOrder::Custom,
        )
        .unwrap();

        assert_eq!(added.custom_order, Some(-12));
        assert!(added.is_starred);

        let mut empty = TaskState::default();
        let first = add_task_in(
            &mut empty,
            &mut SequentialIds::starting_at(10),
            NOW,
            TODAY,
            "first",
            false,
            SortOrder::Custom,
        )
        .unwrap();
        assert_eq!(first.custom_order, Some(-10));
    }

    #[test]
    fn edit_task_updates_given_fields_only() {
        let mut original = task("1", "draft");
        original.due_date = Some(datetime!(2026-10-21 00:00 UTC));
        let mut state = state_of(vec![original]);
        let later = NOW + Duration::hours(1);

        let edited = edit_task_in(
            &mut state,
            later,
            "1",
            TaskEdit {
                title: Some(" final ".to_string()),
                due_date: Some(None),
                ..TaskEdit::default()
            },
        )
        .unwrap();

        assert_eq!(edited.title, "final");
        assert_eq!(edited.due_date, None);
        assert!(!edited.is_starred);
        assert_eq!(edited.updated_at, Some(later));
        assert_eq!(edited.created_at, Some(NOW));

        let blank = TaskEdit {
            title: Some(" ".to_string()),
            ..TaskEdit::default()
        };
        assert_eq!(
            edit_task_in(&mut state, later, "1", blank).unwrap_err().message(),
            "title is required"
        );
        assert_eq!(
            edit_task_in(&mut state, later, "nope", TaskEdit::default())
                .unwrap_err()
                .message(),
            "task not found"
        );
    }

    #[test]
    fn delete_task_removes_group_membership() {
        let mut state = state_of(vec![task("1", "a"), task("2", "b")]);
        create_group_in(
            &mut state,
            &mut SequentialIds::starting_at(50),
            &["1".to_string(), "2".to_string()],
        )
        .unwrap();

        let removed = delete_task_in(&mut state, "1").unwrap();

        assert_eq!(removed.id, "1");
        assert_eq!(ids_of(&state.tasks), vec!["2"]);
        assert_eq!(state.task_groups[0].task_ids, vec!["2".to_string()]);
        assert_eq!(state.tasks[0].group_order.get("50"), Some(&0));
        assert_eq!(delete_task_in(&mut state, "1").unwrap_err().code(), "invalid_input");
    }

    #[test]
    fn toggle_star_flips_flag() {
        let mut state = state_of(vec![task("1", "a")]);

        assert!(toggle_star_in(&mut state, NOW, "1").unwrap().is_starred);
        assert!(!toggle_star_in(&mut state, NOW, "1").unwrap().is_starred);
    }

    #[test]
    fn completing_stamps_completion_time_in_place() {
        let mut state = state_of(vec![task("1", "a"), task("2", "b")]);
        let mut ids = SequentialIds::starting_at(500);

        let done = toggle_complete_in(&mut state, &mut ids, NOW, "2", SortOrder::Recent).unwrap();

        assert!(done.is_completed);
        assert_eq!(done.completed_at, Some(NOW.unix_timestamp() * 1000));
        assert_eq!(ids_of(&state.tasks), vec!["1", "2"]);
    }

    #[test]
    fn reopening_issues_new_id_and_moves_to_front() {
        let mut finished = task("10", "finished");
        finished.is_completed = true;
        finished.completed_at = Some(1_000);
        finished.custom_order = Some(5);
        finished.subtasks.push(Subtask {
            id: "11".to_string(),
            title: "child".to_string(),
            due_date: None,
            is_completed: false,
            parent_id: "10".to_string(),
            custom_order: None,
        });
        let mut open = task("20", "open");
        open.custom_order = Some(-3);
        let mut state = state_of(vec![open, finished]);
        state.task_groups.push(TaskGroup {
            id: "g".to_string(),
            name: "Group 1".to_string(),
            task_ids: vec!["10".to_string(), "20".to_string()],
        });

        let reopened = toggle_complete_in(
            &mut state,
            &mut SequentialIds::starting_at(500),
            NOW,
            "10",
            SortOrder::Custom,
        )
        .unwrap();

        assert_eq!(reopened.id, "500");
        assert!(!reopened.is_completed);
        assert_eq!(reopened.completed_at, None);
        assert_eq!(reopened.custom_order, Some(-4));
        assert_eq!(reopened.subtasks[0].parent_id, "500");
        assert_eq!(ids_of(&state.tasks), vec!["500", "20"]);
        assert_eq!(
            state.task_groups[0].task_ids,
            vec!["500".to_string(), "20".to_string()]
        );
    }

    #[test]
    fn custom_order_saturates_at_the_bottom_of_the_range() {
        let mut floor = task("1", "floor");
        floor.custom_order = Some(i64::MIN + 3);
        let mut finished = task("2", "finished");
        finished.is_completed = true;
        finished.completed_at = Some(1_000);
        let mut state = state_of(vec![floor, finished]);

        let added = add_task_in(
            &mut state,
            &mut SequentialIds::starting_at(10),
            NOW,
            TODAY,
            "new",
            false,
            SortOrder::Custom,
        )
        .unwrap();
        assert_eq!(added.custom_order, Some(i64::MIN));

        let reopened = toggle_complete_in(
            &mut state,
            &mut SequentialIds::starting_at(20),
            NOW,
            "2",
            SortOrder::Custom,
        )
        .unwrap();
        assert_eq!(reopened.custom_order, Some(i64::MIN));
    }

    #[test]
    fn subtasks_are_managed_under_their_parent() {
        let mut state = state_of(vec![task("1", "parent")]);
        let mut ids = SequentialIds::starting_at(200);

        let first = add_subtask_in(&mut state, &mut ids, TODAY, "1", "call wed", None).unwrap();
        let second = add_subtask_in(&mut state, &mut ids, TODAY, "1", "email", None).unwrap();

        assert_eq!(first.id, "200");
        assert_eq!(first.title, "call");
        assert_eq!(first.parent_id, "1");
        assert_eq!(first.due_date.map(|due| due.date()), Some(date!(2026-10-21)));
        assert_eq!(second.due_date, None);

        let edited = edit_subtask_in(
            &mut state,
            "1",
            "201",
            SubtaskEdit {
                title: Some("email the landlord".to_string()),
                due_date: None,
            },
        )
        .unwrap();
        assert_eq!(edited.title, "email the landlord");

        assert!(toggle_subtask_complete_in(&mut state, "1", "200").unwrap().is_completed);

        let reordered = reorder_subtasks_in(&mut state, "1", 1, 0).unwrap();
        let order: Vec<_> = reordered
            .iter()
            .map(|subtask| (subtask.id.as_str(), subtask.custom_order))
            .collect();
        assert_eq!(order, vec![("201", Some(0)), ("200", Some(1))]);

        assert_eq!(delete_subtask_in(&mut state, "1", "200").unwrap().id, "200");
        assert_eq!(
            delete_subtask_in(&mut state, "1", "200").unwrap_err().message(),
            "subtask not found"
        );
        assert_eq!(state.tasks[0].subtasks.len(), 1);
    }

    #[test]
    fn toggle_subtasks_open_flips_flag() {
        let mut state = state_of(vec![task("1", "a")]);
        assert!(toggle_subtasks_open_in(&mut state, "1").unwrap().is_subtasks_open);
    }

    #[test]
    fn reorder_tasks_renumbers_open_tasks_only() {
        let mut a = task("1", "a");
        a.custom_order = Some(0);
        let mut b = task("2", "b");
        b.custom_order = Some(1);
        let mut c = task("3", "c");
        c.custom_order = Some(2);
        let mut done = task("4", "done");
        done.is_completed = true;
        done.custom_order = Some(-50);
        let mut state = state_of(vec![done, c, a, b]);

        let reordered = reorder_tasks_in(&mut state, 0, 2).unwrap();

        assert_eq!(ids_of(&reordered), vec!["2", "3", "1"]);
        assert_eq!(ids_of(&state.tasks), vec!["2", "3", "1", "4"]);
        let orders: Vec<_> = state.tasks.iter().map(|task| task.custom_order).collect();
        assert_eq!(orders, vec![Some(0), Some(1), Some(2), Some(-50)]);
        assert_eq!(reorder_tasks_in(&mut state, 3, 0).unwrap_err().code(), "invalid_input");
    }

    #[test]
    fn groups_track_membership_and_positions() {
        let mut state = state_of(vec![task("1", "a"), task("2", "b"), task("3", "c")]);
        let mut ids = SequentialIds::starting_at(900);

        let first = create_group_in(&mut state, &mut ids, &["1".to_string(), "2".to_string()])
            .unwrap();
        assert_eq!(first.id, "900");
        assert_eq!(first.name, "Group 1");
        assert_eq!(first.task_ids, vec!["1".to_string(), "2".to_string()]);

        let second = create_group_in(&mut state, &mut ids, &["3".to_string(), "2".to_string()])
            .unwrap();
        assert_eq!(second.name, "Group 2");
        assert_eq!(state.task_groups[0].task_ids, vec!["1".to_string()]);
        assert_eq!(group_of(&state, "2").map(|group| group.id.as_str()), Some("901"));
        assert_eq!(state.tasks[1].group_order.get("901"), Some(&1));
        assert!(!state.tasks[1].group_order.contains_key("900"));

        let shrunk = remove_task_from_group_in(&mut state, "901", "3").unwrap();
        assert_eq!(shrunk.task_ids, vec!["2".to_string()]);
        assert!(state.tasks[2].group_order.is_empty());
        assert_eq!(state.tasks[1].group_order.get("901"), Some(&0));
        assert_eq!(
            remove_task_from_group_in(&mut state, "901", "3").unwrap_err().message(),
            "task is not in this group"
        );

        let renamed = rename_group_in(&mut state, "901", "  Errands ").unwrap();
        assert_eq!(renamed.name, "Errands");
        assert_eq!(
            rename_group_in(&mut state, "901", " ").unwrap_err().message(),
            "name is required"
        );

        let grown = add_task_to_group_in(&mut state, "901", "1").unwrap();
        assert_eq!(grown.task_ids, vec!["2".to_string(), "1".to_string()]);
        assert!(state.task_groups[0].task_ids.is_empty());

        let deleted = delete_group_in(&mut state, "900").unwrap();
        assert_eq!(deleted.id, "900");
        assert_eq!(state.tasks.len(), 3);
        assert_eq!(state.task_groups.len(), 1);
        assert_eq!(
            add_task_to_group_in(&mut state, "900", "1").unwrap_err().message(),
            "group not found"
        );
    }

    #[test]
    fn create_group_validates_members() {
        let mut state = state_of(vec![task("1", "a")]);
        let mut ids = SequentialIds::starting_at(1);

        assert_eq!(
            create_group_in(&mut state, &mut ids, &[]).unwrap_err().message(),
            "at least one task is required"
        );
        assert_eq!(
            create_group_in(&mut state, &mut ids, &["missing".to_string()])
                .unwrap_err()
                .message(),
            "task not found"
        );
        assert!(state.task_groups.is_empty());
    }

    #[test]
    fn visible_tasks_respects_show_completed() {
        let mut done = task("1", "done");
        done.is_completed = true;
        let state = state_of(vec![done, task("2", "open")]);

        let mut settings = Settings::default();
        assert_eq!(ids_of(&visible_tasks(&state, &settings)), vec!["2", "1"]);

        settings.show_completed_tasks = false;
        assert_eq!(ids_of(&visible_tasks(&state, &settings)), vec!["2"]);
    }

    #[test]
    fn update_saves_only_when_auto_save_is_on() {
        let mut store = MemoryStore::new();
        let mut ids = SequentialIds::starting_at(1);
        let settings = Settings::default();

        update(&mut store, &settings, &mut ids, |state, ids| {
            add_task_in(state, ids, NOW, TODAY, "kept", false, SortOrder::Recent)
        })
        .unwrap();

        let manual = Settings {
            auto_save: false,
            ..Settings::default()
        };
        update(&mut store, &manual, &mut ids, |state, ids| {
            add_task_in(state, ids, NOW, TODAY, "dropped", false, SortOrder::Recent)
        })
        .unwrap();

        let state = task_store::load_state(&mut store, &mut ids).unwrap().state;
        let titles: Vec<_> = state.tasks.iter().map(|task| task.title.as_str()).collect();
        assert_eq!(titles, vec!["kept"]);
    }

    #[test]
    fn failed_change_writes_nothing() {
        let mut store = MemoryStore::new();
        let mut ids = SequentialIds::starting_at(1);

        let err = update(&mut store, &Settings::default(), &mut ids, |state, _| {
            delete_task_in(state, "missing")
        })
        .unwrap_err();

        assert_eq!(err.message(), "task not found");
        assert_eq!(store.get(TASKS_KEY).unwrap(), None);
    }

    struct RecordingNotifier {
        seen: RefCell<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, alert: &DueAlert) -> Result<(), AppError> {
            self.seen.borrow_mut().push(alert.summary());
            Ok(())
        }
    }

    #[test]
    fn notify_delivers_each_reminder_once_and_persists_state() {
        let mut store = MemoryStore::new();
        let mut due_soon = task("1", "Ship release");
        due_soon.due_date = Some(NOW + Duration::minutes(30) + Duration::seconds(10));
        task_store::save_state(&mut store, &state_of(vec![due_soon])).unwrap();
        let notifier = RecordingNotifier {
            seen: RefCell::new(Vec::new()),
        };
        let settings = Settings {
            notifications_enabled: true,
            ..Settings::default()
        };
        let mut ids = SequentialIds::starting_at(1);

        let first =
            notify_due_tasks_with_store(&mut store, &settings, &mut ids, NOW, &notifier).unwrap();
        let second =
            notify_due_tasks_with_store(&mut store, &settings, &mut ids, NOW, &notifier).unwrap();

        assert_eq!(first.delivered.len(), 1);
        assert!(second.delivered.is_empty());
        assert_eq!(
            notifier.seen.borrow().as_slice(),
            ["Task Due in 30 minutes: Ship release".to_string()]
        );
        assert!(task_store::load_notified(&store).unwrap().has_fired("1", 30));
    }

    #[test]
    fn notify_does_nothing_when_disabled() {
        let mut store = MemoryStore::new();
        let mut due_soon = task("1", "Ship release");
        due_soon.due_date = Some(NOW + Duration::minutes(5));
        task_store::save_state(&mut store, &state_of(vec![due_soon])).unwrap();
        let notifier = RecordingNotifier {
            seen: RefCell::new(Vec::new()),
        };

        let outcome = notify_due_tasks_with_store(
            &mut store,
            &Settings::default(),
            &mut SequentialIds::starting_at(1),
            NOW,
            &notifier,
        )
        .unwrap();

        assert!(outcome.delivered.is_empty());
        assert!(notifier.seen.borrow().is_empty());
        assert_eq!(store.get(NOTIFIED_KEY).unwrap(), None);
    }
}
