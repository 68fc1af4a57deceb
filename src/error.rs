use thiserror::Error;

/// Errors surfaced by the hinting core and its host bindings.
#[derive(Debug, Error)]
pub enum HintError {
    /// No usable characters in the configured hint alphabet.
    #[error("hint keys are empty; set at least one character in `hint_keys`")]
    EmptyAlphabet,

    /// A single hint key can only ever label one candidate.
    #[error("hint keys must contain at least two distinct characters, found {0}")]
    AlphabetTooSmall(usize),

    /// The element the trackers observe does not exist.
    #[error("failed to find root element `{0}`")]
    RootNotFound(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("invalid shortcut: {0}")]
    InvalidShortcut(String),

    #[error("no mode named `{0}`")]
    UnknownMode(String),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document error: {0}")]
    Document(#[from] serde_json::Error),
}
