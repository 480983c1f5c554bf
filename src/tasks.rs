//! Dashboard-side task logic that feeds the notifier: due-today alerts,
//! summary statistics, search filtering and CRUD outcome toasts.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::ToastError;
use crate::notifier::Notifier;
use crate::types::{DisplayHandle, Severity};

/// Missing, null and unrecognized values all read as `Unknown`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Tasks with an `Unknown` priority never raise due-date alerts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A task as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Due date in local time. Date-only values mean local midnight.
    pub fn due(&self) -> Option<NaiveDateTime> {
        let raw = self.due_date.as_deref()?.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(at.with_timezone(&Local).naive_local());
        }
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(at);
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }

    pub fn is_due_on(&self, day: NaiveDate) -> bool {
        self.due().is_some_and(|due| due.date() == day)
    }
}

/// Counters shown on the dashboard cards
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub upcoming_tasks: usize,
}

impl TaskStats {
    pub fn compute(tasks: &[Task], now: NaiveDateTime) -> Self {
        Self {
            total_tasks: tasks.len(),
            completed_tasks: tasks.iter().filter(|t| t.is_completed()).count(),
            pending_tasks: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Pending)
                .count(),
            upcoming_tasks: tasks
                .iter()
                .filter(|t| !t.is_completed() && t.due().is_some_and(|due| due > now))
                .count(),
        }
    }
}

/// Case-insensitive search over title and description.
pub fn filter_tasks<'a>(tasks: &'a [Task], query: &str) -> Vec<&'a Task> {
    let query = query.to_lowercase();
    tasks
        .iter()
        .filter(|task| {
            task.title.to_lowercase().contains(&query)
                || task
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&query))
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DueTaskReport {
    pub shown: usize,
    pub suppressed: usize,
}

impl DueTaskReport {
    fn count(&mut self, outcome: Option<DisplayHandle>) {
        match outcome {
            Some(_) => self.shown += 1,
            None => self.suppressed += 1,
        }
    }
}

/// Raises toasts for open tasks due on `today`: one per high and medium
/// priority task, then a single summary for the low priority ones.
pub fn check_due_tasks(
    notifier: &Notifier,
    tasks: &[Task],
    today: NaiveDate,
) -> Result<DueTaskReport, ToastError> {
    let due_today: Vec<&Task> = tasks
        .iter()
        .filter(|task| {
            if task.due().is_none() {
                debug!("Task {} has no readable due date {:?}", task.id, task.due_date);
            }
            if task.priority == Priority::Unknown {
                debug!("Task {} has no recognized priority", task.id);
            }
            !task.is_completed() && task.is_due_on(today)
        })
        .collect();

    let mut report = DueTaskReport::default();

    for task in due_today.iter().filter(|t| t.priority == Priority::High) {
        let message = format!("URGENT: \"{}\" is due today!", task.title);
        let key = format!("high-priority-{}", task.id);
        report.count(notifier.request_show(&message, Severity::Error, Some(&key), None)?);
    }

    for task in due_today.iter().filter(|t| t.priority == Priority::Medium) {
        let message = format!("\"{}\" is due today", task.title);
        let key = format!("medium-priority-{}", task.id);
        report.count(notifier.request_show(&message, Severity::Warning, Some(&key), None)?);
    }

    let low = due_today
        .iter()
        .filter(|t| t.priority == Priority::Low)
        .count();
    if low > 0 {
        let message = format!("You have {} low priority task(s) due today", low);
        report.count(notifier.request_show(
            &message,
            Severity::Info,
            Some("low-priority-tasks"),
            None,
        )?);
    }

    Ok(report)
}

/// Outcome toasts raised around task CRUD calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    Loaded,
    LoadFailed,
    Created,
    LoginRequired,
}

impl TaskEvent {
    pub fn message(&self) -> &'static str {
        match self {
            TaskEvent::Loaded => "Tasks loaded successfully",
            TaskEvent::LoadFailed => "Failed to load tasks. Please try again.",
            TaskEvent::Created => "Task created successfully!",
            TaskEvent::LoginRequired => "Please login to continue",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            TaskEvent::Loaded | TaskEvent::Created => Severity::Success,
            TaskEvent::LoadFailed => Severity::Error,
            TaskEvent::LoginRequired => Severity::Warning,
        }
    }

    pub fn key(&self) -> Option<&'static str> {
        match self {
            TaskEvent::Loaded => Some("task-load-success"),
            TaskEvent::LoadFailed => Some("task-load-error"),
            TaskEvent::Created => Some("task-create-success"),
            TaskEvent::LoginRequired => None,
        }
    }

    pub fn notify(&self, notifier: &Notifier) -> Result<Option<DisplayHandle>, ToastError> {
        notifier.request_show(self.message(), self.severity(), self.key(), None)
    }
}
