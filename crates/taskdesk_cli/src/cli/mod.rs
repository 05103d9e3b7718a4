use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskdesk_core::config::SettingsOverrides;
use taskdesk_core::error::AppError;
use taskdesk_core::ordering::SortOrder;

#[derive(Parser, Debug)]
#[command(name = "taskdesk", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task; a date in the title becomes its due date
    ///
    /// Example: taskdesk add "Pay rent 5/1"
    /// Example: taskdesk add "Call the plumber friday" --star
    Add {
        title: Option<String>,
        #[arg(long)]
        star: bool,
    },
    /// List tasks in the configured sort order
    ///
    /// Example: taskdesk list
    /// Example: taskdesk list --config-override sortOrder=date-asc
    List,
    /// Show details of a task
    ///
    /// Example: taskdesk show 1760864400000
    Show { id: String },
    /// Mark a task as completed, or reopen a completed one
    ///
    /// Example: taskdesk done 1760864400000
    Done { id: String },
    /// Edit a task's title or due date
    ///
    /// Example: taskdesk edit 1760864400000 --title "Pay rent"
    /// Example: taskdesk edit 1760864400000 --due 2026-11-01
    /// Example: taskdesk edit 1760864400000 --clear-due
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// Due date as YYYY-MM-DD
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long)]
        clear_due: bool,
    },
    /// Delete a task
    ///
    /// Example: taskdesk delete 1760864400000
    Delete { id: String },
    /// Star or unstar a task
    ///
    /// Example: taskdesk star 1760864400000
    Star { id: String },
    /// Move an open task within the custom order (positions start at 1)
    ///
    /// Example: taskdesk move 3 1
    Move { from: usize, to: usize },
    /// Manage subtasks
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommand,
    },
    /// Manage task groups
    Group {
        #[command(subcommand)]
        command: GroupCommand,
    },
    /// Preview how a title would be split into text and due date
    ///
    /// Example: taskdesk parse "Dentist jan 5"
    Parse { text: String },
    /// Check for tasks that are due soon and record the reminders
    ///
    /// Example: taskdesk notify --config-override notificationsEnabled=true
    Notify,
    /// Upgrade a stored task blob and print the current-version envelope
    ///
    /// Example: taskdesk migrate old-tasks.json
    /// Example: cat old-tasks.json | taskdesk migrate
    Migrate { file: Option<PathBuf> },
}

#[derive(Subcommand, Debug)]
pub enum SubtaskCommand {
    /// Example: taskdesk subtask add 1760864400000 "Buy stamps"
    Add { task_id: String, title: String },
    /// Example: taskdesk subtask edit 1760864400000 1760864400001 "Buy two stamps"
    Edit {
        task_id: String,
        subtask_id: String,
        title: String,
    },
    /// Example: taskdesk subtask done 1760864400000 1760864400001
    Done { task_id: String, subtask_id: String },
    /// Example: taskdesk subtask delete 1760864400000 1760864400001
    Delete { task_id: String, subtask_id: String },
    /// Example: taskdesk subtask move 1760864400000 2 1
    Move {
        task_id: String,
        from: usize,
        to: usize,
    },
    /// Show or hide a task's subtasks in listings
    ///
    /// Example: taskdesk subtask expand 1760864400000
    Expand { task_id: String },
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// Example: taskdesk group create 1760864400000 1760864400005
    Create {
        #[arg(required = true)]
        task_ids: Vec<String>,
    },
    /// Example: taskdesk group rename 1760864400010 "Errands"
    Rename { group_id: String, name: String },
    /// Example: taskdesk group add 1760864400010 1760864400007
    Add { group_id: String, task_id: String },
    /// Example: taskdesk group remove 1760864400010 1760864400007
    Remove { group_id: String, task_id: String },
    /// Deletes the group; its tasks are kept
    ///
    /// Example: taskdesk group delete 1760864400010
    Delete { group_id: String },
    /// Example: taskdesk group list
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverride {
    ShowCompletedTasks(bool),
    NotificationsEnabled(bool),
    AutoSave(bool),
    NotificationThresholds(Vec<u32>),
    SortOrder(SortOrder),
}

/// Parse a raw `KEY=VALUE` override string. Keys accept camelCase,
/// snake_case and kebab-case spellings.
pub fn parse_config_override(raw: &str) -> Result<ConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;
    let value = value_raw.trim();

    let canonical_field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    match canonical_field.replace('_', "").as_str() {
        "showcompletedtasks" => parse_bool(value).map(ConfigOverride::ShowCompletedTasks),
        "notificationsenabled" => parse_bool(value).map(ConfigOverride::NotificationsEnabled),
        "autosave" => parse_bool(value).map(ConfigOverride::AutoSave),
        "notificationthresholds" => {
            parse_thresholds(value).map(ConfigOverride::NotificationThresholds)
        }
        "sortorder" => value
            .parse::<SortOrder>()
            .map(ConfigOverride::SortOrder)
            .map_err(|err| err.message().to_string()),
        _ => Err(format!("unknown config field '{canonical_field}'")),
    }
}

pub fn collect_overrides(raw_overrides: &[String]) -> Result<SettingsOverrides, AppError> {
    let mut overrides = SettingsOverrides::default();
    for raw in raw_overrides {
        match parse_config_override(raw).map_err(AppError::invalid_input)? {
            ConfigOverride::ShowCompletedTasks(value) => {
                overrides.show_completed_tasks = Some(value)
            }
            ConfigOverride::NotificationsEnabled(value) => {
                overrides.notifications_enabled = Some(value)
            }
            ConfigOverride::AutoSave(value) => overrides.auto_save = Some(value),
            ConfigOverride::NotificationThresholds(value) => {
                overrides.notification_thresholds = Some(value)
            }
            ConfigOverride::SortOrder(value) => overrides.sort_order = Some(value),
        }
    }
    Ok(overrides)
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("expected true or false, got '{value}'")),
    }
}

fn parse_thresholds(value: &str) -> Result<Vec<u32>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| format!("threshold '{part}' is not a number of minutes"))
        })
        .collect()
}

/// Lowercases and turns every run of separators into one underscore;
/// a capital letter after a lowercase one starts a new word.
fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;
    let mut previous_lower = false;

    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if ch.is_ascii_uppercase() && previous_lower {
                cleaned.push('_');
            }
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
            previous_lower = ch.is_ascii_lowercase();
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
            previous_lower = false;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
