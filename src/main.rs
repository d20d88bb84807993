// main.rs

mod app;
mod config;
mod error;
mod models;
mod parser;
mod repository;
mod store;
mod ui;

use crate::app::App;
use crate::config::{Config, DEFAULT_LOG_FILTER};
use crate::repository::Repository;
use crate::store::JsonFileStore;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

// Logs go to a file; stderr would draw over the alternate screen.
fn init_tracing(config: &Config) {
    let file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
    {
        Ok(file) => file,
        Err(_) => return,
    };
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
}

/// Runs `setup`; if it fails, runs `rollback` before handing the error back.
fn with_rollback<T>(
    setup: impl FnOnce() -> io::Result<T>,
    rollback: impl FnOnce(),
) -> io::Result<T> {
    let res = setup();
    if res.is_err() {
        rollback();
    }
    res
}

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    with_rollback(
        || {
            let mut stdout = io::stdout();
            execute!(stdout, EnterAlternateScreen)?;
            let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
            terminal.hide_cursor()?;
            Ok(terminal)
        },
        || {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            let _ = disable_raw_mode();
        },
    )
}

// Every step runs even if an earlier one fails; the first error is returned.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    let raw = disable_raw_mode();
    let screen = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let cursor = terminal.show_cursor();
    raw.and(screen).and(cursor)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();
    let config = Config::from_env();
    init_tracing(&config);

    let store = JsonFileStore::new(&config.tasks_file);
    let (repo, load_error) = Repository::open(store);
    tracing::info!(tasks_file = %repo.store().path().display(), "starting");
    let app = App::new(repo, load_error);

    let mut terminal = setup_terminal()?;

    let res = ui::run_app(&mut terminal, app);

    restore_terminal(&mut terminal)?;

    if let Err(err) = res {
        tracing::error!(error = %err, "terminal loop failed");
        eprintln!("Error: {:?}", err);
    }

    tracing::info!("exiting");
    Ok(())
}
