//! Error types for `jotnal-core`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The preferences file does not exist yet. Callers fall back to defaults.
  #[error("preferences file not found: {}", path.display())]
  NotFound { path: PathBuf },

  #[error("i/o error at {}: {source}", path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("preferences parse error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("could not determine the home directory (HOME is unset)")]
  NoHomeDir,

  #[error("store password must not be empty")]
  EmptyPassword,
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
