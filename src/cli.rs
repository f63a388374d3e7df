use std::io::Write;

use anyhow::{Context, Result};
use clap::Subcommand;
use time::Date;

use crate::domain::task::{Filter, NewTask, Priority, Task, parse_due_date};
use crate::storage::KeyValueStore;
use crate::store::{Ignored, Outcome, TaskStore};

/// One-shot commands that run against the store without starting the TUI.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a task (newest first)
    Add {
        text: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        /// Due date as YYYY-MM-DD
        #[arg(long, value_parser = parse_due_date)]
        due: Option<Date>,
    },
    /// Print tasks matching a filter
    List {
        #[arg(long)]
        filter: Option<Filter>,
    },
    /// Flip a task between active and completed
    Toggle { id: String },
    /// Delete a task
    Delete { id: String },
    /// Replace the text of a task
    Edit { id: String, text: String },
    /// Remove every completed task
    ClearCompleted,
}

pub fn run<S: KeyValueStore>(store: &mut TaskStore<S>, command: Command) -> Result<()> {
    let mut out = std::io::stdout().lock();
    execute(store, command, &mut out)
}

fn execute<S: KeyValueStore>(
    store: &mut TaskStore<S>,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    let outcome = match command {
        Command::Add {
            text,
            description,
            priority,
            due,
        } => {
            let mut new = NewTask::new(text);
            new.description = description;
            new.priority = priority;
            if let Some(due) = due {
                new = new.with_due_date(due);
            }
            let outcome = store.add(new);
            let tasks = store.tasks();
            if outcome.is_applied()
                && let Some(task) = tasks.first()
            {
                writeln!(out, "added {}", task.id).context("failed to write output")?;
            }
            outcome
        }
        Command::List { filter } => {
            if let Some(filter) = filter {
                store.set_filter(filter);
            }
            for task in store.filtered_tasks() {
                writeln!(out, "{}", format_task(&task)).context("failed to write output")?;
            }
            let counts = store.counts();
            writeln!(
                out,
                "{} active, {} completed",
                counts.active, counts.completed
            )
            .context("failed to write output")?;
            return Ok(());
        }
        Command::Toggle { id } => store.toggle_task(&id),
        Command::Delete { id } => store.delete_task(&id),
        Command::Edit { id, text } => store.edit_task(&id, &text),
        Command::ClearCompleted => store.clear_completed(),
    };

    let written = match outcome {
        Outcome::Applied => writeln!(out, "ok"),
        Outcome::Ignored(reason) => writeln!(out, "ignored: {}", ignored_reason(reason)),
    };
    written.context("failed to write output")
}

fn format_task(task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    let mut line = format!("[{mark}] {}  {}", task.id, task.title);
    if let Some(priority) = task.priority {
        line.push_str(&format!("  ({priority})"));
    }
    if let Some(due) = task.due_label() {
        line.push_str(&format!("  due {due}"));
    }
    line
}

fn ignored_reason(reason: Ignored) -> &'static str {
    match reason {
        Ignored::EmptyText => "text is empty",
        Ignored::UnknownId => "no task with that id",
        Ignored::NothingToClear => "no completed tasks",
        Ignored::Unchanged => "nothing changed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{Persistence, STORAGE_KEY};
    use crate::storage::memory::MemoryStore;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        command: Command,
    }

    fn parse(args: &[&str]) -> Command {
        let argv = std::iter::once("neotodo").chain(args.iter().copied());
        TestCli::try_parse_from(argv).unwrap().command
    }

    fn run_capture(store: &mut TaskStore<MemoryStore>, args: &[&str]) -> String {
        let mut buf = Vec::new();
        execute(store, parse(args), &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn store() -> TaskStore<MemoryStore> {
        TaskStore::open(Persistence::new(MemoryStore::default()), STORAGE_KEY)
    }

    #[test]
    fn add_then_list() {
        let mut store = store();
        let out = run_capture(
            &mut store,
            &["add", "Pay rent", "--priority", "high", "--due", "2024-06-01"],
        );
        let id = store.tasks()[0].id.clone();
        assert_eq!(out, format!("added {id}\nok\n"));

        let out = run_capture(&mut store, &["list"]);
        assert_eq!(
            out,
            format!("[ ] {id}  Pay rent  (high)  due 2024-06-01\n1 active, 0 completed\n")
        );
    }

    #[test]
    fn blank_and_unknown_are_reported_as_ignored() {
        let mut store = store();
        assert_eq!(run_capture(&mut store, &["add", "  "]), "ignored: text is empty\n");
        assert_eq!(
            run_capture(&mut store, &["toggle", "missing"]),
            "ignored: no task with that id\n"
        );
        assert_eq!(
            run_capture(&mut store, &["clear-completed"]),
            "ignored: no completed tasks\n"
        );
    }

    #[test]
    fn list_with_filter() {
        let mut store = store();
        store.add_task("open");
        store.add_task("done");
        let id = store.tasks()[0].id.clone();
        run_capture(&mut store, &["toggle", &id]);

        let out = run_capture(&mut store, &["list", "--filter", "completed"]);
        assert!(out.starts_with(&format!("[x] {id}  done\n")));
        assert!(!out.contains("open"));
    }

    #[test]
    fn rejects_bad_due_date_and_priority() {
        assert!(TestCli::try_parse_from(["neotodo", "add", "x", "--due", "tomorrow"]).is_err());
        assert!(TestCli::try_parse_from(["neotodo", "add", "x", "--priority", "urgent"]).is_err());
    }
}
