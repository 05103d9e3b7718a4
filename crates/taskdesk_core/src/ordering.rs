use crate::error::AppError;
use crate::ids::recency_key;
use crate::model::Task;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Recent,
    DateAsc,
    DateDesc,
    NameAsc,
    NameDesc,
    Starred,
    Custom,
}

impl SortOrder {
    pub const ALL: [SortOrder; 7] = [
        SortOrder::Recent,
        SortOrder::DateAsc,
        SortOrder::DateDesc,
        SortOrder::NameAsc,
        SortOrder::NameDesc,
        SortOrder::Starred,
        SortOrder::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Recent => "recent",
            SortOrder::DateAsc => "date-asc",
            SortOrder::DateDesc => "date-desc",
            SortOrder::NameAsc => "name-asc",
            SortOrder::NameDesc => "name-desc",
            SortOrder::Starred => "starred",
            SortOrder::Custom => "custom",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_ascii_lowercase().replace('_', "-");
        SortOrder::ALL
            .into_iter()
            .find(|order| order.as_str() == wanted)
            .ok_or_else(|| AppError::invalid_input(format!("unknown sort order '{}'", raw.trim())))
    }
}

/// Open tasks in `order`, followed by completed tasks, most recently completed first.
pub fn sorted(tasks: &[Task], order: SortOrder) -> Vec<Task> {
    let (mut open, mut done): (Vec<Task>, Vec<Task>) =
        tasks.iter().cloned().partition(|task| !task.is_completed);

    open.sort_by(|a, b| compare(a, b, order));
    done.sort_by(|a, b| match (a.completed_at, b.completed_at) {
        (Some(left), Some(right)) => right.cmp(&left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => compare(a, b, order),
    });

    open.extend(done);
    open
}

fn compare(a: &Task, b: &Task, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Recent => newest_first(a, b),
        SortOrder::DateAsc => undated_last(a, b).then_with(|| a.due_date.cmp(&b.due_date)),
        SortOrder::DateDesc => undated_last(a, b).then_with(|| b.due_date.cmp(&a.due_date)),
        SortOrder::NameAsc => by_title(a, b),
        SortOrder::NameDesc => by_title(b, a),
        SortOrder::Starred => b.is_starred.cmp(&a.is_starred),
        SortOrder::Custom => {
            let key = |task: &Task| (task.custom_order.is_none(), task.custom_order);
            key(a).cmp(&key(b)).then_with(|| newest_first(a, b))
        }
    }
}

fn newest_first(a: &Task, b: &Task) -> Ordering {
    Reverse(recency_key(&a.id)).cmp(&Reverse(recency_key(&b.id)))
}

fn undated_last(a: &Task, b: &Task) -> Ordering {
    a.due_date.is_none().cmp(&b.due_date.is_none())
}

fn by_title(a: &Task, b: &Task) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.title.cmp(&b.title))
}

/// Smallest `customOrder` among the tasks matching `filter`, never above zero.
pub fn lowest_custom_order<F>(tasks: &[Task], filter: F) -> i64
where
    F: Fn(&Task) -> bool,
{
    tasks
        .iter()
        .filter(|task| filter(task))
        .filter_map(|task| task.custom_order)
        .fold(0, i64::min)
}

/// Moves the element at `from` to `to`, clamping `to` to the end of the list.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<(), AppError> {
    if from >= items.len() {
        return Err(AppError::invalid_input(format!(
            "position {} is out of range",
            from + 1
        )));
    }
    let item = items.remove(from);
    let to = to.min(items.len());
    items.insert(to, item);
    Ok(())
}
