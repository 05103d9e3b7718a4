//! Due-soon reminders.
//!
//! Which thresholds have already fired for which task is an explicit
//! [`NotifiedState`] value: the check takes the previous state and returns
//! the next one, and the caller decides where to keep it.

use crate::error::AppError;
use crate::model::Task;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotifiedState {
    fired: BTreeMap<String, BTreeSet<u32>>,
}

impl NotifiedState {
    pub fn has_fired(&self, task_id: &str, threshold: u32) -> bool {
        self.fired
            .get(task_id)
            .is_some_and(|thresholds| thresholds.contains(&threshold))
    }

    pub fn record(&mut self, task_id: &str, threshold: u32) {
        self.fired
            .entry(task_id.to_string())
            .or_default()
            .insert(threshold);
    }

    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.fired.keys().map(String::as_str)
    }

    /// Drops entries for tasks that are gone, completed, or no longer dated.
    fn retain_pending(&mut self, tasks: &[Task]) {
        self.fired.retain(|task_id, _| {
            tasks
                .iter()
                .any(|task| task.id == *task_id && task.due_date.is_some() && !task.is_completed)
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueAlert {
    pub task_id: String,
    pub title: String,
    pub threshold: u32,
}

impl DueAlert {
    /// "in 1 hour", "in 2 hours", "in 5 minutes".
    pub fn when(&self) -> String {
        let minutes = self.threshold;
        if minutes >= 60 {
            let hours = minutes / 60;
            format!("in {hours} hour{}", if hours > 1 { "s" } else { "" })
        } else {
            format!("in {minutes} minute{}", if minutes > 1 { "s" } else { "" })
        }
    }

    pub fn summary(&self) -> String {
        format!("Task Due {}: {}", self.when(), self.title)
    }

    pub fn body(&self) -> String {
        format!("Task \"{}\" is due {}", self.title, self.when())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderCheck {
    pub alerts: Vec<DueAlert>,
    pub state: NotifiedState,
}

/// Finds open tasks whose due date is exactly a threshold's number of whole
/// minutes away and that have not been reminded at that threshold yet.
pub fn check_due_tasks(
    tasks: &[Task],
    now: OffsetDateTime,
    thresholds: &[u32],
    mut state: NotifiedState,
) -> ReminderCheck {
    state.retain_pending(tasks);
    let mut alerts = Vec::new();

    for task in tasks {
        if task.is_completed {
            continue;
        }
        let Some(due) = task.due_date else {
            continue;
        };
        if due <= now {
            continue;
        }

        let minutes_until_due = (due - now).whole_minutes();
        for &threshold in thresholds {
            if minutes_until_due != i64::from(threshold) || state.has_fired(&task.id, threshold) {
                continue;
            }
            state.record(&task.id, threshold);
            alerts.push(DueAlert {
                task_id: task.id.clone(),
                title: task.title.clone(),
                threshold,
            });
        }
    }

    ReminderCheck { alerts, state }
}

pub trait Notifier {
    fn notify(&self, alert: &DueAlert) -> Result<(), AppError>;
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _alert: &DueAlert) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Debug)]
pub struct NotificationOutcome {
    pub delivered: Vec<DueAlert>,
    pub failures: Vec<NotificationFailure>,
    pub state: NotifiedState,
}

#[derive(Debug)]
pub struct NotificationFailure {
    pub task_id: String,
    pub error: AppError,
}

/// Runs the reminder check and hands every alert to `notifier`. Thresholds
/// whose delivery failed are not recorded.
pub fn deliver_due_alerts(
    tasks: &[Task],
    now: OffsetDateTime,
    thresholds: &[u32],
    state: NotifiedState,
    notifier: &dyn Notifier,
) -> NotificationOutcome {
    let previous = state.clone();
    let check = check_due_tasks(tasks, now, thresholds, state);
    let mut state = check.state;
    let mut delivered = Vec::new();
    let mut failures = Vec::new();

    for alert in check.alerts {
        match notifier.notify(&alert) {
            Ok(()) => delivered.push(alert),
            Err(error) => {
                if !previous.has_fired(&alert.task_id, alert.threshold) {
                    forget(&mut state, &alert);
                }
                failures.push(NotificationFailure {
                    task_id: alert.task_id,
                    error,
                });
            }
        }
    }

    NotificationOutcome {
        delivered,
        failures,
        state,
    }
}

fn forget(state: &mut NotifiedState, alert: &DueAlert) {
    if let Some(thresholds) = state.fired.get_mut(&alert.task_id) {
        thresholds.remove(&alert.threshold);
        if thresholds.is_empty() {
            state.fired.remove(&alert.task_id);
        }
    }
}
