use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::task::{Task, TaskId, normalize_title};
use crate::storage::KeyValueStore;

/// Key the task list is stored under unless overridden on the command line.
pub const STORAGE_KEY: &str = "neo-brutalism-todos";

/// Moves task lists between memory and a [`KeyValueStore`].
///
/// Neither direction reports failure to the caller: corrupt or unreadable
/// data loads as absent, and a failed write is logged and dropped.
pub struct Persistence<S: KeyValueStore> {
    backend: S,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn load(&self, key: &str) -> Option<Vec<Task>> {
        let raw = match self.backend.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("event=load_failed key={key} err={err:#}");
                return None;
            }
        };
        let tasks = decode_tasks(&raw);
        if let Some(tasks) = &tasks {
            log::debug!("event=load key={key} count={}", tasks.len());
        } else {
            log::warn!("event=load_corrupt key={key} bytes={}", raw.len());
        }
        tasks
    }

    /// Writes `tasks` under `key`. Returns whether the write went through.
    pub fn save(&mut self, key: &str, tasks: &[Task]) -> bool {
        let raw = match serde_json::to_string(tasks) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("event=save_failed key={key} stage=encode err={err}");
                return false;
            }
        };
        match self.backend.set_item(key, &raw) {
            Ok(()) => {
                log::debug!("event=save key={key} count={}", tasks.len());
                true
            }
            Err(err) => {
                log::warn!("event=save_failed key={key} stage=write err={err:#}");
                false
            }
        }
    }
}

pub fn generate_id() -> TaskId {
    Uuid::new_v4().to_string()
}

/// Decodes a stored JSON array element by element. Elements that are not
/// valid tasks, have a blank title, or repeat an earlier id are skipped.
/// Returns `None` when the value is not a JSON array at all.
fn decode_tasks(raw: &str) -> Option<Vec<Task>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(raw).ok()?;
    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        let mut task: Task = match serde_json::from_value(value) {
            Ok(task) => task,
            Err(err) => {
                log::warn!("event=load_skip index={idx} reason=decode err={err}");
                continue;
            }
        };
        let Some(title) = normalize_title(&task.title) else {
            log::warn!("event=load_skip index={idx} reason=blank_title");
            continue;
        };
        if !seen.insert(task.id.clone()) {
            log::warn!("event=load_skip index={idx} reason=duplicate_id id={}", task.id);
            continue;
        }
        task.title = title;
        tasks.push(task);
    }
    Some(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::{NewTask, Priority};
    use crate::storage::memory::MemoryStore;
    use anyhow::{Result, anyhow};
    use time::macros::{date, datetime};

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get_item(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow!("disk on fire"))
        }

        fn set_item(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("quota exceeded"))
        }
    }

    fn tasks() -> Vec<Task> {
        let now = datetime!(2024-05-01 10:00:00.123456789 UTC);
        let full = NewTask::new("Write report")
            .with_description("quarterly")
            .with_priority(Priority::Low)
            .with_due_date(date!(2024 - 05 - 10));
        let mut done = Task::create(generate_id(), NewTask::new("Buy milk"), now).unwrap();
        done.completed = true;
        vec![Task::create(generate_id(), full, now).unwrap(), done]
    }

    #[test]
    fn load_after_save_returns_same_list() {
        let mut persistence = Persistence::new(MemoryStore::default());
        let saved = tasks();
        assert!(persistence.save(STORAGE_KEY, &saved));
        assert_eq!(persistence.load(STORAGE_KEY), Some(saved));
    }

    #[test]
    fn load_missing_key_is_absent() {
        let persistence = Persistence::new(MemoryStore::default());
        assert_eq!(persistence.load(STORAGE_KEY), None);
    }

    #[test]
    fn load_invalid_json_is_absent() {
        let persistence = Persistence::new(MemoryStore::with_item(STORAGE_KEY, "{not json"));
        assert_eq!(persistence.load(STORAGE_KEY), None);

        let persistence = Persistence::new(MemoryStore::with_item(STORAGE_KEY, r#"{"a":1}"#));
        assert_eq!(persistence.load(STORAGE_KEY), None);
    }

    #[test]
    fn load_skips_bad_blank_and_duplicate_entries() {
        let raw = r#"[
            {"id":"a","text":" keep ","completed":false,"createdAt":"2024-05-01T10:00:00Z"},
            {"id":"b","completed":true},
            {"id":"c","text":"   ","createdAt":"2024-05-01T10:00:00Z"},
            {"id":"a","text":"dupe","createdAt":"2024-05-01T10:00:00Z"},
            17,
            {"id":"d","title":"from form","createdAt":"2024-05-01T10:00:00Z"}
        ]"#;
        let persistence = Persistence::new(MemoryStore::with_item(STORAGE_KEY, raw));
        let loaded = persistence.load(STORAGE_KEY).unwrap();
        let titles: Vec<_> = loaded.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["keep", "from form"]);
    }

    #[test]
    fn backend_failures_are_swallowed() {
        let mut persistence = Persistence::new(BrokenStore);
        assert_eq!(persistence.load(STORAGE_KEY), None);
        assert!(!persistence.save(STORAGE_KEY, &tasks()));
    }

    #[test]
    fn generated_ids_are_distinct() {
        let ids: HashSet<_> = (0..1000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
