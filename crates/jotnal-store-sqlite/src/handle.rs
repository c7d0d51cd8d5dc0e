//! [`StoreHandle`] — the single live connection to an encrypted store file.

use std::{
  fs::OpenOptions,
  io,
  path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension as _};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::{
  Error, Result,
  encode::{decode_dt, encode_dt},
  migration::{SchemaMigration, VERSION_TABLE},
};

/// One row of `schema_version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaVersionRecord {
  pub version:    u32,
  pub applied_at: DateTime<Utc>,
}

/// An open, key-verified connection to an encrypted store.
///
/// The handle remembers the key it was opened with and caches the highest
/// applied schema version. It is closed on drop; [`StoreHandle::close`] may be
/// called earlier and any number of times.
pub struct StoreHandle {
  conn:    Option<Connection>,
  path:    PathBuf,
  key:     Zeroizing<String>,
  version: u32,
}

impl std::fmt::Debug for StoreHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StoreHandle")
      .field("path", &self.path)
      .field("open", &self.conn.is_some())
      .field("version", &self.version)
      .finish_non_exhaustive()
  }
}

impl StoreHandle {
  /// Open the store at `path` with `password`, creating an empty encrypted
  /// file if none exists.
  ///
  /// The key is checked with a read before the handle is returned, so a wrong
  /// password fails here with [`Error::Authentication`].
  pub fn open(path: impl AsRef<Path>, password: &str) -> Result<Self> {
    let path = path.as_ref();
    if password.is_empty() {
      return Err(Error::EmptyPassword);
    }

    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      jotnal_core::fs::create_private_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    let created = create_owner_only(path)?;

    match Self::connect(path, password) {
      Ok(handle) => {
        if created {
          info!(path = %path.display(), "created encrypted store");
        }
        Ok(handle)
      }
      Err(e) => {
        if created {
          std::fs::remove_file(path).ok();
        }
        Err(e)
      }
    }
  }

  fn connect(path: &Path, password: &str) -> Result<Self> {
    let conn = Connection::open(path)?;

    // Must precede every other statement on the connection.
    conn.pragma_update(None, "key", password)?;
    let cipher: Option<String> = conn
      .query_row("PRAGMA cipher_version", [], |row| row.get(0))
      .optional()?;
    if cipher.is_none() {
      return Err(Error::EncryptionUnavailable);
    }

    probe(&conn).map_err(|e| auth_or_db(e, path))?;
    conn.pragma_update(None, "foreign_keys", true)?;

    let version = read_version(&conn)?;
    debug!(path = %path.display(), version, "opened store");

    Ok(Self {
      conn: Some(conn),
      path: path.to_path_buf(),
      key: Zeroizing::new(password.to_owned()),
      version,
    })
  }

  pub fn path(&self) -> &Path { &self.path }

  /// The last known schema version; refreshed after every applied migration.
  pub fn version(&self) -> u32 { self.version }

  pub fn is_open(&self) -> bool { self.conn.is_some() }

  /// True if `password` is the key this handle was opened or rekeyed with.
  pub fn is_keyed_with(&self, password: &str) -> bool { self.key.as_str() == password }

  /// The live connection, for consumers that query the schema directly.
  pub fn connection(&self) -> Result<&Connection> { self.conn.as_ref().ok_or(Error::Closed) }

  /// Re-read the highest applied version from disk into the cache.
  pub fn refresh_version(&mut self) -> Result<u32> {
    self.version = read_version(self.connection()?)?;
    Ok(self.version)
  }

  pub(crate) fn ensure_version_table(&self) -> Result<()> {
    self.connection()?.execute_batch(VERSION_TABLE)?;
    Ok(())
  }

  /// Apply one migration: its statements and its version record commit or
  /// roll back together.
  pub(crate) fn apply(&mut self, migration: &SchemaMigration) -> Result<()> {
    let conn = self.conn.as_mut().ok_or(Error::Closed)?;
    let fail = |source: rusqlite::Error| Error::Migration {
      version: migration.version,
      description: migration.description,
      source,
    };

    let tx = conn.transaction().map_err(fail)?;
    for statement in migration.statements {
      tx.execute_batch(statement).map_err(fail)?;
    }
    tx.execute(
      "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
      rusqlite::params![migration.version, encode_dt(Utc::now())],
    )
    .map_err(fail)?;
    tx.commit().map_err(fail)?;

    self.version = migration.version;
    Ok(())
  }

  /// Re-encrypt the store in place under `new_password`.
  ///
  /// The new key is confirmed through a separate connection, since this one
  /// keeps answering from its own key and page cache. On failure the store
  /// remains readable with the previous key and the handle is reconnected
  /// with it. Updating any persisted copy of the password is the caller's
  /// job, and must only happen after this returns `Ok`.
  pub fn rekey(&mut self, new_password: &str) -> Result<()> {
    if new_password.is_empty() {
      return Err(Error::EmptyPassword);
    }
    self
      .connection()?
      .pragma_update(None, "rekey", new_password)
      .map_err(Error::Rekey)?;

    if let Err(e) = verify_key(&self.path, new_password) {
      warn!(
        path = %self.path.display(),
        error = %e,
        "new key did not reach the store file, reconnecting with the previous key"
      );
      self.reconnect()?;
      return Err(Error::Rekey(e));
    }

    self.key = Zeroizing::new(new_password.to_owned());
    info!(path = %self.path.display(), "store rekeyed");
    Ok(())
  }

  /// Drop the live connection and open a fresh one with the current key.
  fn reconnect(&mut self) -> Result<()> {
    self.close();
    let mut fresh = Self::connect(&self.path, &self.key)?;
    self.conn = fresh.conn.take();
    self.version = fresh.version;
    Ok(())
  }

  /// Every applied migration, oldest first.
  pub fn applied_migrations(&self) -> Result<Vec<SchemaVersionRecord>> {
    let conn = self.connection()?;
    if !version_table_exists(conn)? {
      return Ok(Vec::new());
    }
    let mut stmt =
      conn.prepare("SELECT version, applied_at FROM schema_version ORDER BY version")?;
    let raws = stmt
      .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)))?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    raws
      .into_iter()
      .map(|(version, at)| -> Result<SchemaVersionRecord> {
        Ok(SchemaVersionRecord { version, applied_at: decode_dt(&at)? })
      })
      .collect()
  }

  /// Names of the user tables in the store, sorted.
  pub fn tables(&self) -> Result<Vec<String>> {
    let conn = self.connection()?;
    let mut stmt = conn.prepare(
      "SELECT name FROM sqlite_master
       WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
       ORDER BY name",
    )?;
    let names = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
  }

  /// Size of the store file in bytes.
  pub fn file_size(&self) -> Result<u64> {
    let meta = std::fs::metadata(&self.path).map_err(|e| Error::io(&self.path, e))?;
    Ok(meta.len())
  }

  /// Release the connection. Closing twice is a no-op.
  pub fn close(&mut self) {
    if let Some(conn) = self.conn.take() {
      match conn.close() {
        Ok(()) => debug!(path = %self.path.display(), "closed store"),
        Err((_conn, e)) => {
          warn!(path = %self.path.display(), error = %e, "error closing store");
        }
      }
    }
  }
}

impl Drop for StoreHandle {
  fn drop(&mut self) { self.close(); }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Create `path` as an empty 0600 file if it does not exist.
///
/// Returns whether the file was created. Anything other than a regular file
/// at `path` is an I/O error.
fn create_owner_only(path: &Path) -> Result<bool> {
  match std::fs::metadata(path) {
    Ok(meta) if meta.is_file() => return Ok(false),
    Ok(_) => {
      return Err(Error::io(
        path,
        io::Error::new(io::ErrorKind::InvalidInput, "store path is not a regular file"),
      ));
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(Error::io(path, e)),
  }

  let mut options = OpenOptions::new();
  options.write(true).create_new(true);
  #[cfg(unix)]
  {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(0o600);
  }
  match options.open(path) {
    Ok(_) => Ok(true),
    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
    Err(e) => Err(Error::io(path, e)),
  }
}

/// Open `path` read-only under `password` and read from it.
fn verify_key(path: &Path, password: &str) -> rusqlite::Result<()> {
  let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
  conn.pragma_update(None, "key", password)?;
  probe(&conn)
}

/// A trivial read that forces SQLCipher to decrypt page 1.
fn probe(conn: &Connection) -> rusqlite::Result<()> {
  conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))?;
  Ok(())
}

fn auth_or_db(e: rusqlite::Error, path: &Path) -> Error {
  match e {
    rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::NotADatabase => {
      Error::Authentication { path: path.to_path_buf() }
    }
    other => Error::Database(other),
  }
}

fn version_table_exists(conn: &Connection) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS (
       SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'
     )",
    [],
    |row| row.get(0),
  )
}

/// Highest applied version; 0 when the table is absent or empty.
fn read_version(conn: &Connection) -> rusqlite::Result<u32> {
  if !version_table_exists(conn)? {
    return Ok(0);
  }
  conn.query_row(
    "SELECT COALESCE(MAX(version), 0) FROM schema_version",
    [],
    |row| row.get(0),
  )
}
