mod cli;

use clap::Parser;
use clap::error::ErrorKind;
use cli::{Cli, Command, GroupCommand, SubtaskCommand, collect_overrides};
use std::io::Read;
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use taskdesk_core::config::{self, Settings};
use taskdesk_core::due_date;
use taskdesk_core::error::AppError;
use taskdesk_core::model::{Subtask, Task, TaskGroup};
use taskdesk_core::notify::NoopNotifier;
use taskdesk_core::storage::migrate;
use taskdesk_core::storage::task_store::TaskState;
use taskdesk_core::task_api::{self, SubtaskEdit, TaskEdit};
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Due")]
    due: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Star")]
    star: String,
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Subtasks")]
    subtasks: String,
}

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Tasks")]
    tasks: usize,
}

fn format_due(due: Option<OffsetDateTime>) -> String {
    due.map(|due| format_date(due.to_offset(due_date::local_offset()).date()))
        .unwrap_or_else(|| "-".to_string())
}

fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

fn parse_due(raw: &str) -> Result<OffsetDateTime, AppError> {
    let date = Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::invalid_input("due date must be YYYY-MM-DD"))?;
    Ok(due_date::due_at_midnight(date))
}

fn status_label(completed: bool) -> &'static str {
    if completed { "done" } else { "open" }
}

fn task_rows(state: &TaskState, tasks: &[Task]) -> Vec<TaskRow> {
    let mut rows = Vec::with_capacity(tasks.len());
    for task in tasks {
        let finished = task
            .subtasks
            .iter()
            .filter(|subtask| subtask.is_completed)
            .count();
        rows.push(TaskRow {
            id: task.id.clone(),
            title: task.title.clone(),
            due: format_due(task.due_date),
            status: status_label(task.is_completed).to_string(),
            star: if task.is_starred { "*" } else { "" }.to_string(),
            group: task_api::group_of(state, &task.id)
                .map(|group| group.name.clone())
                .unwrap_or_default(),
            subtasks: if task.subtasks.is_empty() {
                String::new()
            } else {
                format!("{finished}/{}", task.subtasks.len())
            },
        });

        if task.is_subtasks_open {
            rows.extend(task.subtasks.iter().map(|subtask| TaskRow {
                id: subtask.id.clone(),
                title: format!("  - {}", subtask.title),
                due: format_due(subtask.due_date),
                status: status_label(subtask.is_completed).to_string(),
                star: String::new(),
                group: String::new(),
                subtasks: String::new(),
            }));
        }
    }
    rows
}

fn print_tasks_table(state: &TaskState, tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    let mut table = Table::new(task_rows(state, tasks));
    table.with(Style::sharp());
    println!("{table}");
}

fn print_groups_table(groups: &[TaskGroup]) {
    if groups.is_empty() {
        println!("No groups.");
        return;
    }
    let rows = groups.iter().map(|group| GroupRow {
        id: group.id.clone(),
        name: group.name.clone(),
        tasks: group.task_ids.len(),
    });
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{table}");
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered =
        serde_json::to_string(value).map_err(|err| AppError::invalid_data(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}

fn print_task(json: bool, verb: &str, task: &Task) -> Result<(), AppError> {
    if json {
        return print_json(task);
    }
    match task.due_date {
        Some(due) => println!(
            "{verb} task: {} ({}) due {}",
            task.title,
            task.id,
            format_due(Some(due))
        ),
        None => println!("{verb} task: {} ({})", task.title, task.id),
    }
    Ok(())
}

fn print_subtask(json: bool, verb: &str, subtask: &Subtask) -> Result<(), AppError> {
    if json {
        return print_json(subtask);
    }
    println!(
        "{verb} subtask: {} ({}) of task {}",
        subtask.title, subtask.id, subtask.parent_id
    );
    Ok(())
}

fn print_group(json: bool, verb: &str, group: &TaskGroup) -> Result<(), AppError> {
    if json {
        return print_json(group);
    }
    println!(
        "{verb} group: {} ({}) with {} task(s)",
        group.name,
        group.id,
        group.task_ids.len()
    );
    Ok(())
}

fn print_task_details(task: &Task) {
    println!("ID: {}", task.id);
    println!("Title: {}", task.title);
    println!("Status: {}", status_label(task.is_completed));
    println!("Starred: {}", if task.is_starred { "yes" } else { "no" });
    println!("Due: {}", format_due(task.due_date));
    for subtask in &task.subtasks {
        let mark = if subtask.is_completed { "x" } else { " " };
        println!("  [{mark}] {} ({})", subtask.title, subtask.id);
    }
}

fn one_based(position: usize) -> Result<usize, AppError> {
    position
        .checked_sub(1)
        .ok_or_else(|| AppError::invalid_input("positions start at 1"))
}

fn read_blob(file: Option<&Path>) -> Result<String, AppError> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| AppError::io(format!("{}: {}", path.display(), err))),
        None => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .map_err(|err| AppError::io(err.to_string()))?;
            Ok(content)
        }
    }
}

fn resolve_settings(raw_overrides: &[String]) -> Result<Settings, AppError> {
    let loaded = config::load_settings_with_fallback();
    if let Some(err) = &loaded.error {
        eprintln!("WARN: {err}; using default settings");
    }
    let overrides = collect_overrides(raw_overrides)?;
    Ok(config::merge_overrides(&loaded.settings, &overrides))
}

fn run_subtask_command(
    json: bool,
    settings: &Settings,
    command: SubtaskCommand,
) -> Result<(), AppError> {
    match command {
        SubtaskCommand::Add { task_id, title } => {
            let subtask = task_api::add_subtask(settings, &task_id, &title, None)?;
            print_subtask(json, "Added", &subtask)
        }
        SubtaskCommand::Edit {
            task_id,
            subtask_id,
            title,
        } => {
            let edit = SubtaskEdit {
                title: Some(title),
                due_date: None,
            };
            let subtask = task_api::edit_subtask(settings, &task_id, &subtask_id, edit)?;
            print_subtask(json, "Updated", &subtask)
        }
        SubtaskCommand::Done {
            task_id,
            subtask_id,
        } => {
            let subtask = task_api::toggle_subtask_complete(settings, &task_id, &subtask_id)?;
            let verb = if subtask.is_completed {
                "Completed"
            } else {
                "Reopened"
            };
            print_subtask(json, verb, &subtask)
        }
        SubtaskCommand::Delete {
            task_id,
            subtask_id,
        } => {
            let subtask = task_api::delete_subtask(settings, &task_id, &subtask_id)?;
            print_subtask(json, "Deleted", &subtask)
        }
        SubtaskCommand::Move { task_id, from, to } => {
            let subtasks =
                task_api::reorder_subtasks(settings, &task_id, one_based(from)?, one_based(to)?)?;
            if json {
                return print_json(&subtasks);
            }
            for (index, subtask) in subtasks.iter().enumerate() {
                println!("{}. {} ({})", index + 1, subtask.title, subtask.id);
            }
            Ok(())
        }
        SubtaskCommand::Expand { task_id } => {
            let task = task_api::toggle_subtasks_open(settings, &task_id)?;
            let verb = if task.is_subtasks_open {
                "Expanded"
            } else {
                "Collapsed"
            };
            print_task(json, verb, &task)
        }
    }
}

fn run_group_command(
    json: bool,
    settings: &Settings,
    command: GroupCommand,
) -> Result<(), AppError> {
    match command {
        GroupCommand::Create { task_ids } => {
            let group = task_api::create_group(settings, &task_ids)?;
            print_group(json, "Created", &group)
        }
        GroupCommand::Rename { group_id, name } => {
            let group = task_api::rename_group(settings, &group_id, &name)?;
            print_group(json, "Renamed", &group)
        }
        GroupCommand::Add { group_id, task_id } => {
            let group = task_api::add_task_to_group(settings, &group_id, &task_id)?;
            print_group(json, "Updated", &group)
        }
        GroupCommand::Remove { group_id, task_id } => {
            let group = task_api::remove_task_from_group(settings, &group_id, &task_id)?;
            print_group(json, "Updated", &group)
        }
        GroupCommand::Delete { group_id } => {
            let group = task_api::delete_group(settings, &group_id)?;
            print_group(json, "Deleted", &group)
        }
        GroupCommand::List => {
            let groups = task_api::list_groups()?;
            if json {
                return print_json(&groups);
            }
            print_groups_table(&groups);
            Ok(())
        }
    }
}

fn run_command(cli: Cli) -> Result<(), AppError> {
    let settings = resolve_settings(&cli.config_override)?;
    let json = cli.json;
    debug!(command = ?cli.command, sort_order = %settings.sort_order, "running command");

    match cli.command {
        Command::Add { title, star } => {
            let title = match title {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_input("title is required")),
            };
            let task = task_api::add_task(&settings, &title, star)?;
            print_task(json, "Added", &task)?;
        }
        Command::List => {
            let state = task_api::load_tasks()?.state;
            let tasks = task_api::visible_tasks(&state, &settings);
            if json {
                print_json(&tasks)?;
            } else {
                print_tasks_table(&state, &tasks);
            }
        }
        Command::Show { id } => {
            let task = task_api::get_task(&id)?;
            if json {
                print_json(&task)?;
            } else {
                print_task_details(&task);
            }
        }
        Command::Done { id } => {
            let task = task_api::toggle_complete(&settings, &id)?;
            let verb = if task.is_completed {
                "Completed"
            } else {
                "Reopened"
            };
            print_task(json, verb, &task)?;
        }
        Command::Edit {
            id,
            title,
            due,
            clear_due,
        } => {
            let due_date = match (due, clear_due) {
                (Some(raw), _) => Some(Some(parse_due(&raw)?)),
                (None, true) => Some(None),
                (None, false) => None,
            };
            if title.is_none() && due_date.is_none() {
                return Err(AppError::invalid_input(
                    "nothing to change; pass --title, --due or --clear-due",
                ));
            }
            let edit = TaskEdit {
                title,
                due_date,
                is_starred: None,
            };
            let task = task_api::edit_task(&settings, &id, edit)?;
            print_task(json, "Updated", &task)?;
        }
        Command::Delete { id } => {
            let task = task_api::delete_task(&settings, &id)?;
            print_task(json, "Deleted", &task)?;
        }
        Command::Star { id } => {
            let task = task_api::toggle_star(&settings, &id)?;
            let verb = if task.is_starred {
                "Starred"
            } else {
                "Unstarred"
            };
            print_task(json, verb, &task)?;
        }
        Command::Move { from, to } => {
            let tasks = task_api::reorder_tasks(&settings, one_based(from)?, one_based(to)?)?;
            if json {
                print_json(&tasks)?;
            } else {
                for (index, task) in tasks.iter().enumerate() {
                    println!("{}. {} ({})", index + 1, task.title, task.id);
                }
            }
        }
        Command::Subtask { command } => run_subtask_command(json, &settings, command)?,
        Command::Group { command } => run_group_command(json, &settings, command)?,
        Command::Parse { text } => {
            let stripped = due_date::strip_date_reference(&text);
            let due = stripped.due_date.map(format_date);
            if json {
                print_json(&serde_json::json!({
                    "title": stripped.cleaned_text,
                    "dueDate": due,
                }))?;
            } else {
                println!("Title: {}", stripped.cleaned_text);
                println!("Due: {}", due.as_deref().unwrap_or("-"));
            }
        }
        Command::Notify => {
            let outcome = task_api::notify_due_tasks(&settings, &NoopNotifier)?;
            if json {
                let delivered: Vec<_> = outcome
                    .delivered
                    .iter()
                    .map(|alert| {
                        serde_json::json!({
                            "taskId": alert.task_id,
                            "threshold": alert.threshold,
                            "summary": alert.summary(),
                        })
                    })
                    .collect();
                print_json(&delivered)?;
            } else if !settings.notifications_enabled {
                println!("Notifications are disabled.");
            } else if outcome.delivered.is_empty() {
                println!("No tasks due soon.");
            } else {
                for alert in &outcome.delivered {
                    println!("{}", alert.summary());
                }
            }
        }
        Command::Migrate { file } => {
            let content = read_blob(file.as_deref())?;
            let raw: serde_json::Value = serde_json::from_str(&content)
                .map_err(|err| AppError::invalid_data(format!("input is not JSON: {err}")))?;
            let migrated = migrate::migrate(raw);
            let rendered = serde_json::to_string_pretty(&migrated)
                .map_err(|err| AppError::invalid_data(err.to_string()))?;
            println!("{rendered}");
        }
    }

    Ok(())
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn init_tracing() {
    // Off unless RUST_LOG asks for it; logs go to stderr so stdout stays parseable.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
