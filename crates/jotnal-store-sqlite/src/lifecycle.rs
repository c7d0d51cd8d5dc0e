//! [`LifecycleManager`] — opens or creates the encrypted store, detects its
//! schema version and brings it up to date.
//!
//! ```text
//! Uninitialized → Detecting → Creating  ─┐
//!                           → Verifying ─┴→ Migrating → Ready
//!                  (any step before Ready) → Failed
//! ```
//!
//! Each migration commits atomically together with its version record. A
//! failure stops the run and leaves the store at the last committed version;
//! nothing is retried.

use std::{
  fmt,
  path::{Path, PathBuf},
};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  handle::StoreHandle,
  migration::Registry,
};

// ─── States ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
  Uninitialized,
  /// Checking whether the store file exists.
  Detecting,
  /// No file existed; creating a fresh encrypted store.
  Creating,
  /// A file existed; opening it and verifying the key.
  Verifying,
  /// Applying every registry migration newer than `from`.
  Migrating { from: u32 },
  Ready { version: u32 },
  Failed(Failure),
}

/// Why the last open attempt ended in [`LifecycleState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
  Io,
  Authentication,
  /// The named migration was rolled back; earlier ones stay committed.
  Migration { version: u32 },
  Store,
}

impl From<&Error> for Failure {
  fn from(e: &Error) -> Self {
    match e {
      Error::Io { .. } => Self::Io,
      Error::Authentication { .. } => Self::Authentication,
      Error::Migration { version, .. } => Self::Migration { version: *version },
      _ => Self::Store,
    }
  }
}

impl fmt::Display for LifecycleState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Uninitialized => f.write_str("uninitialized"),
      Self::Detecting => f.write_str("detecting"),
      Self::Creating => f.write_str("creating"),
      Self::Verifying => f.write_str("verifying"),
      Self::Migrating { from } => write!(f, "migrating from v{from}"),
      Self::Ready { version } => write!(f, "ready at v{version}"),
      Self::Failed(Failure::Io) => f.write_str("failed: i/o"),
      Self::Failed(Failure::Authentication) => f.write_str("failed: authentication"),
      Self::Failed(Failure::Migration { version }) => {
        write!(f, "failed: migration {version}")
      }
      Self::Failed(Failure::Store) => f.write_str("failed: store"),
    }
  }
}

/// What a successful [`LifecycleManager::open`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenReport {
  /// True when no store file existed and a new one was created.
  pub created:      bool,
  pub from_version: u32,
  pub version:      u32,
  /// Versions applied during this open, ascending.
  pub applied:      Vec<u32>,
}

// ─── Manager ─────────────────────────────────────────────────────────────────

/// Drives a store file through the lifecycle and owns its handle once ready.
#[derive(Debug)]
pub struct LifecycleManager {
  path:     PathBuf,
  registry: Registry,
  state:    LifecycleState,
  handle:   Option<StoreHandle>,
}

impl LifecycleManager {
  /// A manager for the store at `path` that migrates with `registry`.
  pub fn new(path: impl Into<PathBuf>, registry: Registry) -> Self {
    Self {
      path: path.into(),
      registry,
      state: LifecycleState::Uninitialized,
      handle: None,
    }
  }

  pub fn path(&self) -> &Path { &self.path }

  pub fn registry(&self) -> &Registry { &self.registry }

  pub fn state(&self) -> &LifecycleState { &self.state }

  pub fn is_ready(&self) -> bool { matches!(self.state, LifecycleState::Ready { .. }) }

  /// The current schema version, once ready.
  pub fn version(&self) -> Option<u32> {
    match self.state {
      LifecycleState::Ready { version } => Some(version),
      _ => None,
    }
  }

  /// Open or create the store with `password` and apply pending migrations.
  ///
  /// Any handle from an earlier open is closed first. On error the state is
  /// [`LifecycleState::Failed`] and no handle is kept.
  pub fn open(&mut self, password: &str) -> Result<OpenReport> {
    self.close();

    match self.run(password) {
      Ok((handle, report)) => {
        self.handle = Some(handle);
        self.transition(LifecycleState::Ready { version: report.version });
        Ok(report)
      }
      Err(e) => {
        self.transition(LifecycleState::Failed(Failure::from(&e)));
        Err(e)
      }
    }
  }

  fn run(&mut self, password: &str) -> Result<(StoreHandle, OpenReport)> {
    self.transition(LifecycleState::Detecting);
    let exists = self.path.try_exists().map_err(|e| Error::io(&self.path, e))?;

    let mut handle = if exists {
      self.transition(LifecycleState::Verifying);
      StoreHandle::open(&self.path, password)?
    } else {
      self.transition(LifecycleState::Creating);
      let handle = StoreHandle::open(&self.path, password)?;
      handle.ensure_version_table()?;
      handle
    };

    let from_version = handle.version();
    self.transition(LifecycleState::Migrating { from: from_version });

    // An error here drops `handle`, which closes it.
    let applied = migrate(&self.registry, &mut handle)?;

    let report = OpenReport {
      created: !exists,
      from_version,
      version: handle.version(),
      applied,
    };
    Ok((handle, report))
  }

  /// Re-encrypt the open store under `new_password`.
  ///
  /// Only allowed when ready. After a failure the store is still under the old
  /// key and the caller must not persist `new_password`. The manager stays
  /// ready unless the handle could not be reconnected with the old key.
  pub fn rotate_password(&mut self, new_password: &str) -> Result<()> {
    if !self.is_ready() {
      return Err(self.not_ready());
    }
    let handle = self.handle.as_mut().ok_or(Error::Closed)?;
    let result = handle.rekey(new_password);
    if let Err(e) = &result
      && !handle.is_open()
    {
      self.transition(LifecycleState::Failed(Failure::from(e)));
    }
    result
  }

  /// The ready store's handle.
  pub fn handle(&self) -> Result<&StoreHandle> {
    match (&self.state, &self.handle) {
      (LifecycleState::Ready { .. }, Some(handle)) => Ok(handle),
      _ => Err(self.not_ready()),
    }
  }

  /// The ready store's live connection.
  pub fn connection(&self) -> Result<&Connection> { self.handle()?.connection() }

  /// Give up the handle, leaving the manager uninitialized.
  pub fn into_handle(mut self) -> Option<StoreHandle> { self.handle.take() }

  /// Close the handle, if any, and return to `Uninitialized`. Idempotent.
  pub fn close(&mut self) {
    if let Some(mut handle) = self.handle.take() {
      handle.close();
    }
    if self.state != LifecycleState::Uninitialized {
      self.transition(LifecycleState::Uninitialized);
    }
  }

  fn transition(&mut self, next: LifecycleState) {
    debug!(path = %self.path.display(), from = %self.state, to = %next, "store lifecycle");
    self.state = next;
  }

  fn not_ready(&self) -> Error { Error::NotReady { state: self.state.to_string() } }
}

/// Apply every migration newer than the handle's version, in order.
fn migrate(registry: &Registry, handle: &mut StoreHandle) -> Result<Vec<u32>> {
  let from = handle.version();
  if from > registry.latest_version() {
    warn!(
      path = %handle.path().display(),
      store_version = from,
      latest = registry.latest_version(),
      "store is newer than this build; no migrations applied"
    );
    return Ok(Vec::new());
  }

  // Existing files may predate version tracking.
  handle.ensure_version_table()?;

  let mut applied = Vec::new();
  for migration in registry.pending(from) {
    debug!(version = migration.version, "applying migration");
    handle.apply(migration)?;
    info!(
      version = migration.version,
      description = migration.description,
      "migration applied"
    );
    applied.push(migration.version);
  }
  Ok(applied)
}
