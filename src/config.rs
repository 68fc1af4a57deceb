use config::{Config, ConfigError, Environment, File};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_HINT_KEYS: &str = "fjdkslaghrucm";
const LOCAL_CONFIG: &str = "linkhints.toml";
/// Only used where the platform has no native file events.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Settings {
    /// Shortcut: click mode.
    pub click: String,
    /// Shortcut: shift click mode.
    pub shift_click: String,
    /// Shortcut: ctrl click mode.
    pub ctrl_click: String,
    /// Shortcut: hint blocks and start editing the match.
    pub edit_block: String,
    /// Shortcut: hint blocks and jump to the match.
    pub jump_to_block: String,
    /// The only characters used in hints.
    pub hint_keys: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            click: "f".into(),
            shift_click: "shift+f".into(),
            ctrl_click: "ctrl+f".into(),
            edit_block: "g e".into(),
            jump_to_block: "g b".into(),
            hint_keys: DEFAULT_HINT_KEYS.into(),
        }
    }
}

/// Names of the settings that hold a mode shortcut.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SettingsKey {
    Click,
    ShiftClick,
    CtrlClick,
    EditBlock,
    JumpToBlock,
}

impl Settings {
    /// Layers built-in defaults, the user file, a local `linkhints.toml`, an explicit file
    /// and `LINKHINTS_*` variables, later sources winning.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("click", defaults.click)?
            .set_default("shift_click", defaults.shift_click)?
            .set_default("ctrl_click", defaults.ctrl_click)?
            .set_default("edit_block", defaults.edit_block)?
            .set_default("jump_to_block", defaults.jump_to_block)?
            .set_default("hint_keys", defaults.hint_keys)?;

        if let Some(user) = get_user_config_path() {
            builder = builder.add_source(File::from(user).required(false));
        }
        builder = builder.add_source(File::with_name(LOCAL_CONFIG).required(false));
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder
            .add_source(Environment::with_prefix("LINKHINTS"))
            .build()?
            .try_deserialize()
    }

    pub fn shortcut(&self, key: SettingsKey) -> &str {
        match key {
            SettingsKey::Click => &self.click,
            SettingsKey::ShiftClick => &self.shift_click,
            SettingsKey::CtrlClick => &self.ctrl_click,
            SettingsKey::EditBlock => &self.edit_block,
            SettingsKey::JumpToBlock => &self.jump_to_block,
        }
    }
}

pub fn get_user_config_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("linkhints");
    path.push("linkhints.toml");
    Some(path)
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::full(raw).map(|p| p.into_owned()).unwrap_or_else(|_| raw.to_string()))
}

/// Writes the defaults to the user config file unless it already exists.
pub fn ensure_user_config() -> Result<(), anyhow::Error> {
    let Some(path) = get_user_config_path() else {
        return Ok(());
    };
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, toml::to_string_pretty(&Settings::default())?)?;
    info!(path = %path.display(), "wrote default settings");
    Ok(())
}

/// Sets one key in a settings file, leaving the others untouched.
pub fn save_setting(path: &Path, key: &str, value: &str) -> Result<(), anyhow::Error> {
    let defaults = toml::Value::try_from(Settings::default())?;
    let known: Vec<String> = defaults
        .as_table()
        .map(|t| t.keys().cloned().collect())
        .unwrap_or_default();
    if !known.iter().any(|k| k == key) {
        anyhow::bail!("unknown setting `{key}`; expected one of: {}", known.join(", "));
    }

    let config_str = fs::read_to_string(path).unwrap_or_else(|_| "".to_string());
    let mut doc = config_str.parse::<toml::Table>()?;

    doc.insert(key.to_string(), toml::Value::String(value.to_string()));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, doc.to_string())?;

    Ok(())
}

/// A settings reload result delivered by [`watch`].
pub type SettingsUpdate = Result<Settings, String>;

/// Watches the settings files and sends a reload whenever one of them changes.
///
/// The parent directories are watched, not the files, so a file created later or replaced
/// through a rename is still seen.
pub async fn watch(
    explicit: Option<PathBuf>,
    tx: UnboundedSender<SettingsUpdate>,
    cancel: CancellationToken,
) {
    let files = watched_files(explicit.as_deref());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher = match RecommendedWatcher::new(
        move |res| {
            let _ = event_tx.send(res);
        },
        notify::Config::default().with_poll_interval(POLL_INTERVAL),
    ) {
        Ok(watcher) => watcher,
        Err(e) => {
            warn!(error = %e, "settings watcher unavailable, live reload disabled");
            return;
        }
    };

    let dirs: BTreeSet<&Path> = files.iter().filter_map(|f| f.parent()).collect();
    for dir in dirs {
        match watcher.watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => debug!(dir = %dir.display(), "watching for settings changes"),
            Err(e) => warn!(dir = %dir.display(), error = %e, "failed to watch settings dir"),
        }
    }

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = event_rx.recv() => match event {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    warn!(error = %e, "settings watcher error");
                    continue;
                }
                None => break,
            },
        };
        if !touches_settings(&event, &files) {
            continue;
        }

        let update = Settings::load(explicit.as_deref()).map_err(|e| e.to_string());
        match &update {
            Ok(_) => info!(paths = ?event.paths, "settings changed on disk"),
            Err(e) => warn!(error = %e, "failed to reload settings"),
        }
        if tx.send(update).is_err() {
            break;
        }
    }
}

/// Absolute paths of every settings file whose directory exists.
fn watched_files(explicit: Option<&Path>) -> Vec<PathBuf> {
    get_user_config_path()
        .into_iter()
        .chain([PathBuf::from(LOCAL_CONFIG)])
        .chain(explicit.map(Path::to_path_buf))
        .filter_map(|p| canonical_file(&p))
        .collect()
}

/// Resolves the directory part only; the file itself may not exist yet.
fn canonical_file(path: &Path) -> Option<PathBuf> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Some(fs::canonicalize(dir).ok()?.join(path.file_name()?))
}

/// Reads of the files (including our own reloads) are not changes.
fn touches_settings(event: &Event, files: &[PathBuf]) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_))
        && event
            .paths
            .iter()
            .filter_map(|p| canonical_file(p))
            .any(|p| files.contains(&p))
}
