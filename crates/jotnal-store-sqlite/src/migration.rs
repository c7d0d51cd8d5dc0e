//! Versioned schema migrations for the Jotnal store.
//!
//! Released migrations are append-only: a store file records which versions
//! it has applied, so version 3 must mean the same schema change forever.
//! Every statement uses `IF NOT EXISTS` so re-running a migration against a
//! schema that already has its effect is harmless.

use std::borrow::Cow;

use crate::{Error, Result};

/// One versioned, one-way schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaMigration {
  pub version:     u32,
  pub description: &'static str,
  /// Executed in order inside a single transaction.
  pub statements:  &'static [&'static str],
}

/// Tracks applied migrations; one row per version.
pub(crate) const VERSION_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL          -- RFC 3339 UTC
)";

const MIGRATIONS: &[SchemaMigration] = &[
  SchemaMigration {
    version:     1,
    description: "projects, files and project settings",
    statements:  &[
      "CREATE TABLE IF NOT EXISTS projects (
          id          INTEGER PRIMARY KEY AUTOINCREMENT,
          name        TEXT NOT NULL,
          path        TEXT NOT NULL UNIQUE,
          description TEXT,
          created_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          updated_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP
      )",
      "CREATE TABLE IF NOT EXISTS files (
          id         INTEGER PRIMARY KEY AUTOINCREMENT,
          project_id INTEGER NOT NULL,
          path       TEXT NOT NULL,
          name       TEXT NOT NULL,
          content    TEXT,
          size       INTEGER DEFAULT 0,
          created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
          UNIQUE (project_id, path)
      )",
      "CREATE TABLE IF NOT EXISTS project_settings (
          id             INTEGER PRIMARY KEY AUTOINCREMENT,
          project_id     INTEGER NOT NULL UNIQUE,
          language       TEXT DEFAULT 'go',
          build_command  TEXT,
          run_command    TEXT,
          test_command   TEXT,
          linter_command TEXT,
          created_at     TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          updated_at     TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
      )",
      "CREATE INDEX IF NOT EXISTS idx_files_project_id ON files(project_id)",
      "CREATE INDEX IF NOT EXISTS idx_files_name ON files(name)",
      "CREATE INDEX IF NOT EXISTS idx_projects_name ON projects(name)",
    ],
  },
  SchemaMigration {
    version:     2,
    description: "file change history",
    statements:  &[
      "CREATE TABLE IF NOT EXISTS file_history (
          id                 INTEGER PRIMARY KEY AUTOINCREMENT,
          file_id            INTEGER NOT NULL,
          content            TEXT,
          change_description TEXT,
          created_at         TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
      )",
      "CREATE INDEX IF NOT EXISTS idx_file_history_file_id ON file_history(file_id)",
    ],
  },
  SchemaMigration {
    version:     3,
    description: "code snippets",
    statements:  &[
      "CREATE TABLE IF NOT EXISTS snippets (
          id          INTEGER PRIMARY KEY AUTOINCREMENT,
          title       TEXT NOT NULL,
          description TEXT,
          language    TEXT NOT NULL,
          code        TEXT NOT NULL,
          tags        TEXT,
          created_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          updated_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP
      )",
      "CREATE INDEX IF NOT EXISTS idx_snippets_language ON snippets(language)",
      "CREATE INDEX IF NOT EXISTS idx_snippets_title ON snippets(title)",
    ],
  },
  SchemaMigration {
    version:     4,
    description: "file bookmarks",
    statements:  &[
      "CREATE TABLE IF NOT EXISTS bookmarks (
          id          INTEGER PRIMARY KEY AUTOINCREMENT,
          file_id     INTEGER NOT NULL,
          line_number INTEGER NOT NULL,
          description TEXT,
          created_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
      )",
      "CREATE INDEX IF NOT EXISTS idx_bookmarks_file_id ON bookmarks(file_id)",
    ],
  },
  SchemaMigration {
    version:     5,
    description: "hierarchical employee directory",
    statements:  &[
      // manager_id is NULL for the head of the hierarchy.
      "CREATE TABLE IF NOT EXISTS employees (
          id          INTEGER PRIMARY KEY AUTOINCREMENT,
          first_name  TEXT NOT NULL,
          last_name   TEXT NOT NULL,
          middle_name TEXT,
          email       TEXT UNIQUE,
          position    TEXT NOT NULL,
          department  TEXT,
          manager_id  INTEGER,
          phone       TEXT,
          hire_date   TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          created_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          updated_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
          FOREIGN KEY (manager_id) REFERENCES employees(id) ON DELETE SET NULL
      )",
      "CREATE INDEX IF NOT EXISTS idx_employees_manager_id ON employees(manager_id)",
      "CREATE INDEX IF NOT EXISTS idx_employees_department ON employees(department)",
      "CREATE INDEX IF NOT EXISTS idx_employees_email ON employees(email)",
      "CREATE INDEX IF NOT EXISTS idx_employees_full_name ON employees(last_name, first_name)",
    ],
  },
];

/// The migrations shipped with this build, lowest version first.
pub fn builtin_migrations() -> &'static [SchemaMigration] { MIGRATIONS }

// ─── Registry ────────────────────────────────────────────────────────────────

/// An immutable, validated sequence of migrations handed to the lifecycle
/// manager. Versions run contiguously from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
  migrations: Cow<'static, [SchemaMigration]>,
}

impl Registry {
  /// The migrations shipped with this build.
  pub fn builtin() -> Self {
    Self { migrations: Cow::Borrowed(MIGRATIONS) }
  }

  /// Build a registry from an explicit list, e.g. for tests.
  pub fn new(migrations: Vec<SchemaMigration>) -> Result<Self> {
    validate(&migrations)?;
    Ok(Self { migrations: Cow::Owned(migrations) })
  }

  /// The prefix of this registry up to and including `version`.
  pub fn up_to(&self, version: u32) -> Self {
    let migrations = self
      .migrations
      .iter()
      .copied()
      .take_while(|m| m.version <= version)
      .collect::<Vec<_>>();
    Self { migrations: Cow::Owned(migrations) }
  }

  pub fn migrations(&self) -> &[SchemaMigration] { &self.migrations }

  /// The highest version, or 0 for an empty registry.
  pub fn latest_version(&self) -> u32 {
    self.migrations.last().map_or(0, |m| m.version)
  }

  /// Migrations newer than `current`, in ascending version order.
  pub fn pending(&self, current: u32) -> impl Iterator<Item = &SchemaMigration> {
    self.migrations.iter().filter(move |m| m.version > current)
  }
}

impl Default for Registry {
  fn default() -> Self { Self::builtin() }
}

fn validate(migrations: &[SchemaMigration]) -> Result<()> {
  for (index, migration) in migrations.iter().enumerate() {
    let expected = index as u32 + 1;
    if migration.version != expected {
      return Err(Error::InvalidRegistry(format!(
        "expected version {expected} at position {index}, found {}",
        migration.version
      )));
    }
    if migration.statements.is_empty() {
      return Err(Error::InvalidRegistry(format!(
        "migration {} has no statements",
        migration.version
      )));
    }
  }
  Ok(())
}
