use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{backend::CrosstermBackend, prelude::*};
use tracing::info;
use tracing_subscriber::EnvFilter;

use csv_viewer::app::{App, AppMode, ViewConfig};
use csv_viewer::debounce::FilterTrigger;
use csv_viewer::filter::FilterArg;
use csv_viewer::loader::{LoadRequest, LoadResponse, Source, start_loader_worker};
use csv_viewer::ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Filterable CSV viewer")]
struct Args {
    /// CSV file path or http(s) URL
    #[arg(value_name = "SOURCE", env = "CSV_VIEWER_SOURCE")]
    source: String,

    /// Maximum number of matching rows to display
    #[arg(short = 'n', long, default_value_t = 100, env = "CSV_VIEWER_LIMIT")]
    limit: usize,

    /// When filter edits are applied
    #[arg(long, value_enum, default_value_t = FilterTrigger::Debounced, env = "CSV_VIEWER_TRIGGER")]
    trigger: FilterTrigger,

    /// Quiet period before a debounced filter pass, in milliseconds
    #[arg(long, default_value_t = 250, env = "CSV_VIEWER_DEBOUNCE_MS")]
    debounce_ms: u64,

    /// Initial filter as COLUMN=VALUE; COLUMN is a header name or #INDEX (repeatable)
    #[arg(short = 'f', long = "filter", value_name = "COLUMN=VALUE")]
    filters: Vec<FilterArg>,

    /// Write logs to this file (filtered by RUST_LOG, default info)
    #[arg(long, value_name = "PATH", env = "CSV_VIEWER_LOG")]
    log_file: Option<PathBuf>,
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }
    let source = Source::parse(&args.source);
    info!(%source, limit = args.limit, trigger = ?args.trigger, "startup");

    let mut terminal = setup_terminal()?;

    // Loader worker channels
    let (req_tx, req_rx) = crossbeam_channel::unbounded::<LoadRequest>();
    let (resp_tx, resp_rx) = crossbeam_channel::unbounded::<LoadResponse>();

    let config = ViewConfig {
        source_label: source.to_string(),
        display_limit: args.limit,
        trigger: args.trigger,
        debounce: Duration::from_millis(args.debounce_ms),
        initial_filters: args.filters,
    };
    std::thread::spawn(move || start_loader_worker(source, req_rx, resp_tx));

    let mut app = App::new(config, req_tx, resp_rx);
    app.request_load();

    let tick_rate = Duration::from_millis(100);
    let res = run_app(&mut terminal, &mut app, tick_rate);

    restore_terminal(terminal)?;
    if let Err(e) = res {
        eprintln!("Error: {e:?}");
    }
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();
    // Redraw only when state changes or on tick
    let mut dirty = true;
    loop {
        while let Ok(msg) = app.resp_rx.try_recv() {
            app.handle_load_response(msg);
            dirty = true;
        }

        let now = Instant::now();
        if app.tick(now) {
            dirty = true;
        }

        let tick_due = last_tick.elapsed() >= tick_rate;
        if dirty || tick_due {
            terminal.draw(|f| ui::draw(f, app))?;
            dirty = false;
            if tick_due {
                last_tick = Instant::now();
            }
        }

        // Wake up for whichever comes first: the next tick or a pending filter pass.
        let mut timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::from_secs(0));
        if let Some(remaining) = app.debouncer.remaining(Instant::now()) {
            timeout = timeout.min(remaining);
        }

        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
        {
            let page = terminal.size()?.height.saturating_sub(8).max(1) as usize;
            match app.mode {
                AppMode::Exporting => handle_key_export(app, key),
                AppMode::Filtering => handle_key_filter(app, key),
                AppMode::Normal => handle_key_normal(app, key, page),
            }
            dirty = true;
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key_normal(app: &mut App, key: KeyEvent, page: usize) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.copy_visible_rows(),
            KeyCode::Char('r') => app.reset_filters(),
            _ => {}
        }
        return;
    }
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('/') => app.begin_filter_input(),
        KeyCode::Char('?') => app.toggle_help(),
        KeyCode::Esc => {
            if app.show_help {
                app.toggle_help();
            } else {
                app.reset_filters();
            }
        }
        KeyCode::Enter => {
            app.apply_filters();
            app.status = format!("{} of {} rows match", app.matched.len(), app.rows.len());
        }
        KeyCode::Up | KeyCode::Char('k') => app.move_cell_up(),
        KeyCode::Down | KeyCode::Char('j') => app.move_cell_down(),
        KeyCode::Left | KeyCode::Char('h') => app.move_cell_left(),
        KeyCode::Right | KeyCode::Char('l') => app.move_cell_right(),
        KeyCode::Tab => app.next_column(),
        KeyCode::PageDown => app.page_down(page),
        KeyCode::PageUp => app.page_up(page),
        KeyCode::Home | KeyCode::Char('g') => app.select_first_row(),
        KeyCode::End | KeyCode::Char('G') => app.select_last_row(),
        KeyCode::Char('r') => app.request_load(),
        KeyCode::Char('c') => app.copy_current_cell(),
        KeyCode::Char('C') => app.copy_current_row(),
        KeyCode::Char('E') => app.begin_export(),
        KeyCode::Char('v') => {
            app.toggle_cell_viewer();
            app.status = if app.show_cell_viewer {
                "Cell viewer: ON".into()
            } else {
                "Cell viewer: OFF".into()
            };
        }
        _ => {}
    }
}

fn handle_key_filter(app: &mut App, key: KeyEvent) {
    let now = Instant::now();
    match key.code {
        KeyCode::Enter => app.commit_filter_input(),
        KeyCode::Esc => app.cancel_filter_input(),
        KeyCode::Backspace => app.filter_input_backspace(now),
        KeyCode::Tab => {
            app.next_column();
            app.begin_filter_input();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.filter_input_char(c, now)
        }
        _ => {}
    }
}

fn handle_key_export(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_export(),
        KeyCode::Esc => app.cancel_export(),
        KeyCode::Backspace => app.export_input_backspace(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.export_input_char(c)
        }
        _ => {}
    }
}
