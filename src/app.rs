use std::sync::mpsc::Receiver;

use crate::domain::task::{Counts, Filter, NewTask, Priority, Task, TaskId};
use crate::storage::KeyValueStore;
use crate::store::{Change, ChangeKind, Outcome, TaskStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Adding,
    Editing(TaskId),
}

pub struct App<S: KeyValueStore> {
    store: TaskStore<S>,
    changes: Receiver<Change>,
    pub visible: Vec<Task>,
    pub counts: Counts,
    pub filter: Filter,
    pub selected: usize,
    pub mode: InputMode,
    pub input: String,
    pub new_priority: Priority,
    pub status: Option<String>,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(mut store: TaskStore<S>) -> Self {
        let changes = store.subscribe();
        let mut app = Self {
            visible: store.filtered_tasks(),
            counts: store.counts(),
            filter: store.filter(),
            store,
            changes,
            selected: 0,
            mode: InputMode::Normal,
            input: String::new(),
            new_priority: Priority::Medium,
            status: None,
        };
        app.clamp_selection();
        app
    }

    /// Drains pending store changes and rebuilds the view when there were any.
    pub fn poll_changes(&mut self) -> usize {
        let mut seen = 0;
        let mut last = None;
        for change in self.changes.try_iter() {
            seen += 1;
            last = Some(change);
        }
        if let Some(change) = last {
            self.show(&change);
            self.set_status(&describe(&change.kind));
        }
        seen
    }

    /// Rebuilds the view from a published snapshot.
    fn show(&mut self, change: &Change) {
        self.visible = change
            .tasks
            .iter()
            .filter(|t| change.filter.matches(t))
            .cloned()
            .collect();
        self.counts = Counts::of(&change.tasks);
        self.filter = change.filter;
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        if self.selected >= self.visible.len() {
            self.selected = self.visible.len().saturating_sub(1);
        }
    }

    pub fn select_next(&mut self) {
        if !self.visible.is_empty() {
            self.selected = (self.selected + 1).min(self.visible.len() - 1);
        }
    }

    pub fn select_previous(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    fn selected_id(&self) -> Option<TaskId> {
        self.visible.get(self.selected).map(|t| t.id.clone())
    }

    pub fn start_adding(&mut self) {
        self.mode = InputMode::Adding;
        self.input.clear();
        self.set_status("Type new task and press Enter");
    }

    pub fn start_editing(&mut self) {
        if let Some(task) = self.visible.get(self.selected) {
            self.input = task.title.clone();
            self.mode = InputMode::Editing(task.id.clone());
            self.set_status("Edit task and press Enter");
        }
    }

    pub fn cancel_input(&mut self) {
        self.mode = InputMode::Normal;
        self.input.clear();
        self.set_status("Canceled");
    }

    /// Submits the input buffer. Blank input leaves the form as it is.
    pub fn submit_input(&mut self) {
        let outcome = match &self.mode {
            InputMode::Normal => return,
            InputMode::Adding => self
                .store
                .add(NewTask::new(self.input.as_str()).with_priority(self.new_priority)),
            InputMode::Editing(id) => {
                let id = id.clone();
                self.store.edit_task(&id, &self.input)
            }
        };
        if outcome.is_applied() {
            if self.mode == InputMode::Adding {
                self.selected = 0;
            }
            self.mode = InputMode::Normal;
            self.input.clear();
            self.new_priority = Priority::Medium;
        }
        self.poll_changes();
    }

    pub fn cycle_new_priority(&mut self) {
        self.new_priority = self.new_priority.next();
    }

    pub fn toggle_selected(&mut self) {
        if let Some(id) = self.selected_id() {
            self.store.toggle_task(&id);
            self.poll_changes();
        }
    }

    pub fn delete_selected(&mut self) {
        if let Some(id) = self.selected_id()
            && self.store.delete_task(&id).is_applied()
        {
            self.selected = self.selected.saturating_sub(1);
            self.poll_changes();
        }
    }

    pub fn cycle_selected_priority(&mut self) {
        let Some(task) = self.visible.get(self.selected) else {
            return;
        };
        let mut details = task.details();
        details.priority = Some(details.priority.map_or(Priority::Low, Priority::next));
        let id = task.id.clone();
        self.store.update_details(&id, details);
        self.poll_changes();
    }

    pub fn clear_completed(&mut self) {
        if self.store.clear_completed() == Outcome::Applied {
            self.poll_changes();
        } else {
            self.set_status("No completed items");
        }
    }

    pub fn set_filter(&mut self, filter: Filter) {
        if self.store.set_filter(filter).is_applied() {
            self.selected = 0;
            self.poll_changes();
        }
    }

    pub fn cycle_filter(&mut self) {
        self.set_filter(self.filter.next());
    }

    pub fn set_status(&mut self, msg: &str) {
        self.status = Some(msg.to_string());
    }
}

fn describe(kind: &ChangeKind) -> String {
    match kind {
        ChangeKind::Added(_) => "Added".to_string(),
        ChangeKind::Toggled(_) => "Toggled completion".to_string(),
        ChangeKind::Deleted(_) => "Deleted".to_string(),
        ChangeKind::Edited(_) => "Edited".to_string(),
        ChangeKind::DetailsUpdated(_) => "Updated priority".to_string(),
        ChangeKind::ClearedCompleted(n) => format!("Cleared {n} completed"),
        ChangeKind::FilterChanged(filter) => format!("Showing {filter}"),
    }
}
