use std::path::PathBuf;

use thiserror::Error;

/// Result alias for fallible library operations (config files, watchers).
pub type CadenceResult<T> = Result<T, CadenceError>;

#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

/// Failure reported by a frame callback.
///
/// The loop never propagates these; they are logged with the hook name and
/// the frame carries on.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CallbackError(String);

impl CallbackError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for CallbackError {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

impl From<&str> for CallbackError {
    fn from(msg: &str) -> Self {
        Self(msg.to_string())
    }
}

/// What every frame callback returns.
pub type CallbackResult = Result<(), CallbackError>;
