mod app;
mod cli;
mod domain;
mod logging;
mod persist;
mod storage;
mod store;
mod ui;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use app::App;
use cli::Command;
use domain::task::{Filter, NewTask, Priority};
use persist::{Persistence, STORAGE_KEY};
use storage::KeyValueStore;
use storage::memory::MemoryStore;
use storage::sqlite::{SqliteStore, data_dir};
use store::TaskStore;

#[derive(Parser, Debug)]
#[command(author, version, about = "neotodo — a small todo list for the terminal", long_about = None)]
struct Args {
    /// Tick interval of render loop in milliseconds
    #[arg(long, default_value_t = 120)]
    tick_ms: u64,

    /// Start with demo tasks (in memory, nothing is saved)
    #[arg(long, default_value_t = false)]
    demo: bool,

    /// Use in-memory storage instead of SQLite
    #[arg(long, default_value_t = false)]
    memory: bool,

    /// Path to SQLite storage file (default: OS data dir)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Storage key the task list lives under
    #[arg(long, default_value = STORAGE_KEY)]
    storage_key: String,

    /// Initial filter: all, active or completed
    #[arg(long, default_value = "all")]
    filter: Filter,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Directory for log files (default: OS data dir)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_error = start_logging(&args).err();

    let backend: Box<dyn KeyValueStore> = if args.demo || args.memory {
        Box::new(MemoryStore::default())
    } else if let Some(path) = args.db_path.as_ref() {
        Box::new(SqliteStore::open(path)?)
    } else {
        Box::new(SqliteStore::open_default()?)
    };

    let mut store = TaskStore::open(Persistence::new(backend), args.storage_key.as_str());
    if args.demo {
        seed_demo(&mut store);
    }
    store.set_filter(args.filter);

    if let Some(command) = args.command {
        return cli::run(&mut store, command);
    }

    let mut app = App::new(store);
    if let Some(err) = log_error {
        app.set_status(&format!("Logging disabled: {err:#}"));
    }
    ui::run(app, Duration::from_millis(args.tick_ms))
}

fn start_logging(args: &Args) -> Result<()> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(logging::default_log_level());
    let dir = match args.log_dir.clone() {
        Some(dir) => dir,
        None => logging::default_log_dir(&data_dir()?),
    };
    logging::init_logging(level, &dir)
}

fn seed_demo<S: KeyValueStore>(store: &mut TaskStore<S>) {
    store.add(NewTask::new("Draft release notes").with_priority(Priority::Low));
    store.add(
        NewTask::new("Check PRs waiting for review")
            .with_description("team repos first")
            .with_priority(Priority::High),
    );
    store.add(NewTask::new("Write documentation").with_priority(Priority::Medium));
}
