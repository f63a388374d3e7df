use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

pub type TaskId = String;

/// Input limits carried over from the task form.
pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Low,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(anyhow!(
                "unknown priority `{other}`; expected low|medium|high"
            )),
        }
    }
}

/// A single to-do item as it is held in memory and persisted as JSON.
///
/// The JSON layout keeps the keys written by the web version of the app
/// (`text`, `createdAt`, `dueDate`) and accepts the form variant that used
/// `title` instead of `text`. Optional fields with unexpected values decode
/// as absent rather than failing the whole task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: TaskId,
    #[serde(rename = "text", alias = "title")]
    pub title: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_description"
    )]
    pub description: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_priority"
    )]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub created_at: OffsetDateTime,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_due_date",
        deserialize_with = "lenient_due_date"
    )]
    pub due_date: Option<Date>,
}

impl Task {
    /// Builds a fresh, not yet completed task. Returns `None` when the title
    /// is blank after trimming.
    pub fn create(id: TaskId, new: NewTask, created_at: OffsetDateTime) -> Option<Self> {
        let title = normalize_title(&new.title)?;
        Some(Self {
            id,
            title,
            description: new.description.as_deref().and_then(normalize_description),
            priority: new.priority,
            completed: false,
            created_at,
            due_date: new.due_date,
        })
    }

    pub fn details(&self) -> TaskDetails {
        TaskDetails {
            description: self.description.clone(),
            priority: self.priority,
            due_date: self.due_date,
        }
    }

    pub fn due_label(&self) -> Option<String> {
        self.due_date.and_then(|d| d.format(DATE_FORMAT).ok())
    }
}

/// Input for adding a task. Only the title is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Date>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_due_date(mut self, due_date: Date) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

/// The metadata half of a task that can be replaced independently of its title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDetails {
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Date>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub const VALUES: [Filter; 3] = [Filter::All, Filter::Active, Filter::Completed];

    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.completed,
            Filter::Completed => task.completed,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Active => "active",
            Filter::Completed => "completed",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Filter::All => Filter::Active,
            Filter::Active => Filter::Completed,
            Filter::Completed => Filter::All,
        }
    }

    pub fn empty_message(self) -> &'static str {
        match self {
            Filter::All => "NO TASKS YET!",
            Filter::Active => "NO ACTIVE TASKS!",
            Filter::Completed => "NO COMPLETED TASKS!",
        }
    }

    pub fn empty_hint(self) -> &'static str {
        match self {
            Filter::All => "Add your first task above!",
            Filter::Active | Filter::Completed => "Switch to \"all\" to see other tasks",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Filter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" => Ok(Filter::Completed),
            other => Err(anyhow!(
                "unknown filter `{other}`; expected all|active|completed"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub active: usize,
    pub completed: usize,
}

impl Counts {
    pub fn of(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            active: tasks.len() - completed,
            completed,
        }
    }

    pub fn total(&self) -> usize {
        self.active + self.completed
    }
}

/// Trims and bounds a title. `None` means the input must be rejected.
pub fn normalize_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(truncate_chars(trimmed, MAX_TITLE_CHARS))
}

/// Blank descriptions are stored as absent.
pub fn normalize_description(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(truncate_chars(trimmed, MAX_DESCRIPTION_CHARS))
}

pub fn parse_due_date(raw: &str) -> Result<Date> {
    let raw = raw.trim();
    // RFC 3339 timestamps start with the calendar date.
    let day = raw.get(..10).unwrap_or(raw);
    Date::parse(day, DATE_FORMAT).map_err(|e| anyhow!("invalid due date `{raw}`: {e}"))
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    cut.trim_end().to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<TaskId, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

fn lenient_description<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(normalize_description))
}

fn lenient_priority<'de, D>(deserializer: D) -> Result<Option<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| s.parse().ok()))
}

fn lenient_due_date<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| parse_due_date(s).ok()))
}

fn serialize_due_date<S>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(date) => {
            let text = date
                .format(DATE_FORMAT)
                .map_err(serde::ser::Error::custom)?;
            serializer.serialize_some(&text)
        }
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    fn sample() -> Task {
        Task {
            id: "t-1".to_string(),
            title: "Buy milk".to_string(),
            description: Some("2%".to_string()),
            priority: Some(Priority::High),
            completed: false,
            created_at: datetime!(2024-05-01 10:00:00 UTC),
            due_date: Some(date!(2024 - 05 - 03)),
        }
    }

    #[test]
    fn serializes_with_web_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["text"], "Buy milk");
        assert_eq!(json["createdAt"], "2024-05-01T10:00:00Z");
        assert_eq!(json["dueDate"], "2024-05-03");
        assert_eq!(json["priority"], "high");
        assert!(json.get("title").is_none());
    }

    #[test]
    fn absent_optionals_are_omitted() {
        let mut task = sample();
        task.description = None;
        task.priority = None;
        task.due_date = None;
        let json = serde_json::to_value(task).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("description"));
        assert!(!obj.contains_key("priority"));
        assert!(!obj.contains_key("dueDate"));
    }

    #[test]
    fn decodes_form_shape_with_title_key() {
        let raw = r#"{"id":"1714557600000","title":"Ship it","description":"",
            "priority":"medium","completed":true,"createdAt":"2024-05-01T10:00:00.000Z"}"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.title, "Ship it");
        assert_eq!(task.description, None);
        assert_eq!(task.priority, Some(Priority::Medium));
        assert!(task.completed);
    }

    #[test]
    fn tolerates_unknown_and_malformed_optionals() {
        let raw = r#"{"id":42,"text":"x","priority":"urgent","dueDate":"someday",
            "createdAt":"2024-05-01T10:00:00Z","color":"pink"}"#;
        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.id, "42");
        assert_eq!(task.priority, None);
        assert_eq!(task.due_date, None);
        assert!(!task.completed);
    }

    #[test]
    fn due_date_accepts_timestamp_prefix() {
        assert_eq!(
            parse_due_date("2024-06-01T09:30:00.000Z").unwrap(),
            date!(2024 - 06 - 01)
        );
        assert!(parse_due_date("June 1st").is_err());
    }

    #[test]
    fn normalize_title_trims_rejects_blank_and_bounds() {
        assert_eq!(normalize_title("  hi  ").as_deref(), Some("hi"));
        assert_eq!(normalize_title("   "), None);
        let long = "あ".repeat(MAX_TITLE_CHARS + 20);
        assert_eq!(
            normalize_title(&long).unwrap().chars().count(),
            MAX_TITLE_CHARS
        );
    }

    #[test]
    fn create_rejects_blank_title() {
        let now = datetime!(2024-05-01 10:00:00 UTC);
        assert!(Task::create("a".into(), NewTask::new(" \t "), now).is_none());
        let task = Task::create("b".into(), NewTask::new(" x ").with_description("  "), now)
            .unwrap();
        assert_eq!(task.title, "x");
        assert_eq!(task.description, None);
        assert!(!task.completed);
    }

    #[test]
    fn filter_parses_known_values_only() {
        assert_eq!("Active".parse::<Filter>().unwrap(), Filter::Active);
        assert_eq!(" completed ".parse::<Filter>().unwrap(), Filter::Completed);
        assert!("done".parse::<Filter>().is_err());
    }

    #[test]
    fn counts_split_active_and_completed() {
        let mut done = sample();
        done.id = "t-2".into();
        done.completed = true;
        let counts = Counts::of(&[sample(), done]);
        assert_eq!(counts, Counts { active: 1, completed: 1 });
        assert_eq!(counts.total(), 2);
    }
}
