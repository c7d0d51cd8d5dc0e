//! Error type for `jotnal-store-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("i/o error at {}: {source}", path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The key did not decrypt the file, or the file is not an encrypted store.
  /// Callers should ask for the password again rather than treat this as
  /// corruption.
  #[error("wrong password for store at {}", path.display())]
  Authentication { path: PathBuf },

  /// A migration failed and was rolled back. The store stays at the version
  /// before `version`.
  #[error("migration {version} ({description}) failed: {source}")]
  Migration {
    version:     u32,
    description: &'static str,
    #[source]
    source:      rusqlite::Error,
  },

  /// Re-encryption failed; the store is still under its previous key.
  #[error("rekey failed: {0}")]
  Rekey(#[source] rusqlite::Error),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("store password must not be empty")]
  EmptyPassword,

  /// The linked SQLite has no SQLCipher codec; a key would be ignored.
  #[error("sqlite was built without encryption support")]
  EncryptionUnavailable,

  #[error("store handle is closed")]
  Closed,

  #[error("store is not ready (state: {state})")]
  NotReady { state: String },

  #[error("invalid migration registry: {0}")]
  InvalidRegistry(String),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
