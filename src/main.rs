// src/main.rs
mod actions;
mod app;
mod config;
mod dom;
mod error;
mod input;
mod labels;
mod models;
mod modes;
mod observer;
mod selector;
mod session;
mod shortcut;
mod theme;
mod tracker;
mod trie;
mod ui;
mod utils;

use std::{fs, io, path::PathBuf, sync::OnceLock, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange, Event, EventStream, KeyEventKind},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{prelude::*, Terminal};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::app::App;
use crate::config::{DEFAULT_HINT_KEYS, Settings, SettingsUpdate, ensure_user_config, expand_path, get_user_config_path, save_setting};
use crate::dom::Document;
use crate::theme::Theme;
use crate::utils::Debouncer;

const DEMO_DOCUMENT: &str = include_str!("../assets/demo.json");
/// Quiet period before a burst of settings changes is applied.
const RELOAD_DEBOUNCE: Duration = Duration::from_secs(1);
const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "linkhints", version, about = "Keyboard link hints for a terminal outliner")]
struct Cli {
    /// Document to open (JSON). Defaults to a built-in demo graph.
    #[arg(long)]
    document: Option<String>,

    /// Extra settings file, layered over the user and local ones.
    #[arg(long)]
    config: Option<String>,

    /// Log filter, e.g. `debug` or `linkhints::tracker=trace`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Set one key in the user settings file.
    Set { key: String, value: String },
    /// Print the labels that would be assigned to `count` candidates.
    Labels {
        count: usize,
        #[arg(long, default_value = DEFAULT_HINT_KEYS)]
        keys: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Set { key, value }) => {
            let path = get_user_config_path().context("could not determine the config directory")?;
            save_setting(&path, &key, &value)?;
            println!("{key} = \"{value}\" written to {}", path.display());
            return Ok(());
        }
        Some(Commands::Labels { count, keys }) => {
            let allocation = labels::allocate(0..count, &keys)?;
            for (candidate, label) in &allocation.reverse {
                println!("{candidate}\t{label}");
            }
            return Ok(());
        }
        None => {}
    }

    init_tracing(cli.log_level.as_deref())?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting linkhints");

    if let Err(e) = ensure_user_config() {
        warn!(error = %e, "could not write default settings");
    }
    let config_path = cli.config.as_deref().map(expand_path);
    let settings = Settings::load(config_path.as_deref()).context("failed to load settings")?;

    let document = match cli.document.as_deref() {
        Some(raw) => {
            let path = expand_path(raw);
            Document::load(&path).with_context(|| format!("failed to open document {}", path.display()))?
        }
        None => Document::from_json(DEMO_DOCUMENT).context("built-in demo document is invalid")?,
    };

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run(&mut terminal, document, settings, config_path).await;

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableFocusChange, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        error!(error = %e, "linkhints exited with an error");
    }
    result
}

async fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    document: Document,
    settings: Settings,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut app = App::new(document, settings);
    let (width, height) = terminal::size()?;
    let area = ui::document_area(Rect::new(0, 0, width, height));
    app.resize(area.width, area.height);

    let theme = Theme::default();
    let (tx, mut rx) = mpsc::unbounded_channel::<SettingsUpdate>();
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(config::watch(config_path, tx, cancel.clone()));

    let mut events = EventStream::new();
    let mut reloads = Debouncer::new(RELOAD_DEBOUNCE);
    let mut tick = tokio::time::interval(TICK_RATE);

    loop {
        terminal.draw(|f| ui::draw(f, &app, &theme))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if input::handle_key(&mut app, key).await? {
                        break;
                    }
                }
                Some(Ok(Event::FocusLost)) => app.blur(),
                Some(Ok(Event::Resize(width, height))) => {
                    let area = ui::document_area(Rect::new(0, 0, width, height));
                    app.resize(area.width, area.height);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    cancel.cancel();
                    return Err(e).context("failed to read terminal events");
                }
                None => break,
            },
            Some(update) = rx.recv() => reloads.push(update),
            update = reloads.ready() => app.apply_settings(update),
            _ = tick.tick() => {}
        }
    }

    app.shutdown();
    cancel.cancel();
    if let Err(e) = watcher.await {
        warn!(error = %e, "settings watcher did not shut down cleanly");
    }
    info!("bye");
    Ok(())
}

/// Logs go to a daily file under the cache dir; the terminal belongs to the UI.
fn init_tracing(level: Option<&str>) -> Result<()> {
    let log_dir = dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("linkhints");
    fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("linkhints")
        .filename_suffix("log")
        .max_log_files(7)
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = match level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();
    Ok(())
}
