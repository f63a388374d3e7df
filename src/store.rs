use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};

use time::OffsetDateTime;

use crate::domain::task::{
    Counts, Filter, NewTask, Task, TaskDetails, TaskId, normalize_description, normalize_title,
};
use crate::persist::{Persistence, generate_id};
use crate::storage::KeyValueStore;

/// Result of a store operation. Invalid input never errors; it is reported
/// here and otherwise has no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored(Ignored),
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    EmptyText,
    UnknownId,
    NothingToClear,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Added(TaskId),
    Toggled(TaskId),
    Deleted(TaskId),
    Edited(TaskId),
    DetailsUpdated(TaskId),
    ClearedCompleted(usize),
    FilterChanged(Filter),
}

/// Published after every applied operation. `tasks` is the list as it is
/// after the change.
#[derive(Debug, Clone)]
pub struct Change {
    pub kind: ChangeKind,
    pub tasks: Arc<[Task]>,
    pub filter: Filter,
}

pub struct TaskStore<S: KeyValueStore> {
    tasks: Arc<[Task]>,
    filter: Filter,
    persistence: Persistence<S>,
    key: String,
    subscribers: Vec<Sender<Change>>,
}

impl<S: KeyValueStore> TaskStore<S> {
    /// Loads whatever is stored under `key`; absent or unreadable data
    /// starts an empty list.
    pub fn open(persistence: Persistence<S>, key: impl Into<String>) -> Self {
        let key = key.into();
        let tasks = persistence.load(&key).unwrap_or_default();
        log::info!("event=store_open key={key} count={}", tasks.len());
        Self {
            tasks: tasks.into(),
            filter: Filter::default(),
            persistence,
            key,
            subscribers: Vec::new(),
        }
    }

    pub fn tasks(&self) -> Arc<[Task]> {
        Arc::clone(&self.tasks)
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    #[cfg(test)]
    pub fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn subscribe(&mut self) -> Receiver<Change> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn add_task(&mut self, text: &str) -> Outcome {
        self.add(NewTask::new(text))
    }

    /// Prepends a task; the newest task is always first.
    pub fn add(&mut self, new: NewTask) -> Outcome {
        let Some(task) = Task::create(generate_id(), new, OffsetDateTime::now_utc()) else {
            return Outcome::Ignored(Ignored::EmptyText);
        };
        let id = task.id.clone();
        let next: Vec<Task> = std::iter::once(task)
            .chain(self.tasks.iter().cloned())
            .collect();
        self.commit(next, ChangeKind::Added(id))
    }

    pub fn toggle_task(&mut self, id: &str) -> Outcome {
        self.replace_one(id, ChangeKind::Toggled(id.to_string()), |task| {
            task.completed = !task.completed;
        })
    }

    pub fn delete_task(&mut self, id: &str) -> Outcome {
        if self.get(id).is_none() {
            return Outcome::Ignored(Ignored::UnknownId);
        }
        let next: Vec<Task> = self.tasks.iter().filter(|t| t.id != id).cloned().collect();
        self.commit(next, ChangeKind::Deleted(id.to_string()))
    }

    /// Replaces the title only. Blank text is checked before the id.
    pub fn edit_task(&mut self, id: &str, new_text: &str) -> Outcome {
        let Some(title) = normalize_title(new_text) else {
            return Outcome::Ignored(Ignored::EmptyText);
        };
        self.replace_one(id, ChangeKind::Edited(id.to_string()), |task| {
            task.title = title;
        })
    }

    pub fn update_details(&mut self, id: &str, details: TaskDetails) -> Outcome {
        self.replace_one(id, ChangeKind::DetailsUpdated(id.to_string()), |task| {
            task.description = details.description.as_deref().and_then(normalize_description);
            task.priority = details.priority;
            task.due_date = details.due_date;
        })
    }

    pub fn clear_completed(&mut self) -> Outcome {
        let next: Vec<Task> = self.tasks.iter().filter(|t| !t.completed).cloned().collect();
        let removed = self.tasks.len() - next.len();
        if removed == 0 {
            return Outcome::Ignored(Ignored::NothingToClear);
        }
        self.commit(next, ChangeKind::ClearedCompleted(removed))
    }

    /// Filter changes are view state and are not persisted.
    pub fn set_filter(&mut self, filter: Filter) -> Outcome {
        if self.filter == filter {
            return Outcome::Ignored(Ignored::Unchanged);
        }
        self.filter = filter;
        log::debug!("event=filter_changed filter={filter}");
        self.publish(ChangeKind::FilterChanged(filter));
        Outcome::Applied
    }

    pub fn filtered_tasks(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| self.filter.matches(t))
            .cloned()
            .collect()
    }

    pub fn counts(&self) -> Counts {
        Counts::of(&self.tasks)
    }

    fn replace_one(
        &mut self,
        id: &str,
        kind: ChangeKind,
        update: impl FnOnce(&mut Task),
    ) -> Outcome {
        let Some(pos) = self.tasks.iter().position(|t| t.id == id) else {
            return Outcome::Ignored(Ignored::UnknownId);
        };
        let mut next = self.tasks.to_vec();
        update(&mut next[pos]);
        self.commit(next, kind)
    }

    fn commit(&mut self, next: Vec<Task>, kind: ChangeKind) -> Outcome {
        self.tasks = next.into();
        log::info!("event=task_change kind={kind:?} count={}", self.tasks.len());
        self.persistence.save(&self.key, &self.tasks);
        self.publish(kind);
        Outcome::Applied
    }

    fn publish(&mut self, kind: ChangeKind) {
        let change = Change {
            kind,
            tasks: Arc::clone(&self.tasks),
            filter: self.filter,
        };
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }
}
