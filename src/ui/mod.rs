use std::io::{Stdout, stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};

use crate::app::{App, InputMode};
use crate::domain::task::{Filter, Priority, Task};
use crate::storage::KeyValueStore;

pub fn run<S: KeyValueStore>(mut app: App<S>, tick_rate: Duration) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut last_tick = Instant::now();
    let res = loop {
        app.poll_changes();
        if let Err(err) = terminal.draw(|f| draw(f, &app)) {
            break Err(err.into());
        }

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        match poll_key(timeout) {
            Ok(Some(code)) => {
                if handle_key(&mut app, code) {
                    break Ok(());
                }
            }
            Ok(None) => {}
            Err(err) => break Err(err),
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    };

    cleanup_terminal(&mut terminal)?;
    log::info!("event=app_exit ok={}", res.is_ok());
    res
}

fn poll_key(timeout: Duration) -> Result<Option<KeyCode>> {
    if event::poll(timeout)?
        && let Event::Key(key) = event::read()?
        && key.kind == KeyEventKind::Press
    {
        return Ok(Some(key.code));
    }
    Ok(None)
}

/// Returns true when the app should quit.
fn handle_key<S: KeyValueStore>(app: &mut App<S>, code: KeyCode) -> bool {
    match app.mode {
        InputMode::Normal => match code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') | KeyCode::Down => app.select_next(),
            KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
            KeyCode::Char('a') | KeyCode::Char('n') => app.start_adding(),
            KeyCode::Char('e') => app.start_editing(),
            KeyCode::Enter | KeyCode::Char(' ') => app.toggle_selected(),
            KeyCode::Char('d') | KeyCode::Delete => app.delete_selected(),
            KeyCode::Char('c') => app.clear_completed(),
            KeyCode::Char('p') => app.cycle_selected_priority(),
            KeyCode::Char('1') => app.set_filter(Filter::All),
            KeyCode::Char('2') => app.set_filter(Filter::Active),
            KeyCode::Char('3') => app.set_filter(Filter::Completed),
            KeyCode::Tab => app.cycle_filter(),
            _ => {}
        },
        InputMode::Adding | InputMode::Editing(_) => match code {
            KeyCode::Esc => app.cancel_input(),
            KeyCode::Enter => app.submit_input(),
            KeyCode::Tab if app.mode == InputMode::Adding => app.cycle_new_priority(),
            KeyCode::Backspace => {
                app.input.pop();
            }
            KeyCode::Char(c) => app.input.push(c),
            _ => {}
        },
    }

    false
}

fn draw<S: KeyValueStore>(f: &mut ratatui::Frame, app: &App<S>) {
    let size = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(size);

    f.render_widget(render_header(app), chunks[0]);
    f.render_widget(render_filters(app.filter), chunks[1]);

    if app.visible.is_empty() {
        f.render_widget(render_empty(app.filter), chunks[2]);
    } else {
        let mut list_state = ListState::default();
        list_state.select(Some(app.selected));
        let list = render_list(&app.visible, app.selected);
        f.render_stateful_widget(list, chunks[2], &mut list_state);
    }

    f.render_widget(render_footer(app), chunks[3]);
}

fn render_header<S: KeyValueStore>(app: &App<S>) -> Paragraph<'static> {
    let summary = format!(
        "Active: {}  Done: {}  All: {}",
        app.counts.active,
        app.counts.completed,
        app.counts.total()
    );
    let line = Line::from(vec![
        Span::styled(
            "TODO",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  GET STUFF DONE!  |  "),
        Span::styled(summary, Style::default().fg(Color::Green)),
    ]);
    Paragraph::new(line)
        .block(Block::default().title("Overview").borders(Borders::ALL))
        .wrap(Wrap { trim: true })
}

fn render_filters(active: Filter) -> Tabs<'static> {
    let titles: Vec<Line> = Filter::VALUES
        .iter()
        .enumerate()
        .map(|(idx, filter)| Line::from(format!("{} {}", idx + 1, filter.label().to_uppercase())))
        .collect();
    let selected = Filter::VALUES
        .iter()
        .position(|f| *f == active)
        .unwrap_or_default();
    Tabs::new(titles)
        .select(selected)
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().title("Filter (1/2/3 ; Tab)").borders(Borders::ALL))
}

fn render_empty(filter: Filter) -> Paragraph<'static> {
    let lines = vec![
        Line::from(Span::styled(
            filter.empty_message(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(filter.empty_hint()),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().title("Tasks").borders(Borders::ALL))
}

fn priority_style(priority: Priority) -> Style {
    match priority {
        Priority::High => Style::default().fg(Color::Red),
        Priority::Medium => Style::default().fg(Color::Yellow),
        Priority::Low => Style::default().fg(Color::Blue),
    }
}

fn render_list(tasks: &[Task], selected: usize) -> List<'_> {
    let items: Vec<ListItem> = tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| {
            let symbol = if task.completed { "✔" } else { "•" };
            let mut line = vec![Span::raw(format!(" {symbol} {}", task.title))];
            if let Some(priority) = task.priority {
                line.push(Span::styled(
                    format!("  [{}]", priority.label().to_uppercase()),
                    priority_style(priority),
                ));
            }
            if let Some(due) = task.due_label() {
                line.push(Span::raw(format!("  due {due}")));
            }
            if let Some(description) = &task.description {
                line.push(Span::styled(
                    format!("  {description}"),
                    Style::default().fg(Color::DarkGray),
                ));
            }

            let style = if idx == selected {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else if task.completed {
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default()
            };

            ListItem::new(Line::from(line)).style(style)
        })
        .collect();

    List::new(items)
        .block(
            Block::default()
                .title("Tasks (j/k move ; a add ; e edit ; Space toggle ; p priority ; d delete ; c clear done)")
                .borders(Borders::ALL),
        )
        .highlight_symbol("➤ ")
}

fn render_footer<S: KeyValueStore>(app: &App<S>) -> Paragraph<'_> {
    let (label, title) = match &app.mode {
        InputMode::Normal => {
            let msg = app.status.as_deref().unwrap_or("q quit ; a add ; c clear done");
            return Paragraph::new(msg).block(Block::default().title("Normal").borders(Borders::ALL));
        }
        InputMode::Adding => (
            format!("New task [{}]: ", app.new_priority.label().to_uppercase()),
            "Input (Enter to add / Tab priority / Esc to cancel)",
        ),
        InputMode::Editing(_) => (
            "Edit task: ".to_string(),
            "Input (Enter to save / Esc to cancel)",
        ),
    };
    let line = Line::from(vec![
        Span::raw(label),
        Span::styled(&app.input, Style::default().fg(Color::Yellow)),
        Span::raw("█"),
    ]);
    Paragraph::new(line).block(Block::default().title(title).borders(Borders::ALL))
}

fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{Persistence, STORAGE_KEY};
    use crate::storage::memory::MemoryStore;
    use crate::store::TaskStore;

    fn app() -> App<MemoryStore> {
        App::new(TaskStore::open(
            Persistence::new(MemoryStore::default()),
            STORAGE_KEY,
        ))
    }

    fn type_text(app: &mut App<MemoryStore>, text: &str) {
        for c in text.chars() {
            handle_key(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn keys_drive_add_toggle_and_filter() {
        let mut app = app();
        handle_key(&mut app, KeyCode::Char('a'));
        handle_key(&mut app, KeyCode::Tab);
        type_text(&mut app, "Buy milkk");
        handle_key(&mut app, KeyCode::Backspace);
        handle_key(&mut app, KeyCode::Enter);

        assert_eq!(app.visible[0].title, "Buy milk");
        assert_eq!(app.visible[0].priority, Some(Priority::High));

        handle_key(&mut app, KeyCode::Char(' '));
        handle_key(&mut app, KeyCode::Char('2'));
        assert!(app.visible.is_empty());
        handle_key(&mut app, KeyCode::Char('3'));
        assert_eq!(app.visible.len(), 1);
    }

    #[test]
    fn typing_q_in_input_does_not_quit() {
        let mut app = app();
        handle_key(&mut app, KeyCode::Char('n'));
        assert!(!handle_key(&mut app, KeyCode::Char('q')));
        assert_eq!(app.input, "q");
        handle_key(&mut app, KeyCode::Esc);
        assert!(handle_key(&mut app, KeyCode::Char('q')));
    }
}
