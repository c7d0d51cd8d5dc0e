//! Conversions between SQLite column values and domain types.
//!
//! Rows written by the store itself carry RFC 3339 timestamps; rows whose
//! timestamp columns were filled by `DEFAULT CURRENT_TIMESTAMP` carry
//! SQLite's `YYYY-MM-DD HH:MM:SS` UTC text. Both decode to `DateTime<Utc>`;
//! an explicit `NULL` decodes to `None`.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, Row, types::Type};

use jotnal_core::entity::{
  Bookmark, Employee, File, FileHistory, Project, ProjectSettings, Snippet,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
    .map(|naive| naive.and_utc())
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

/// Timestamp columns are nullable in the schema; `NULL` reads as `None`.
fn get_dt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
  let Some(raw) = row.get::<_, Option<String>>(idx)? else {
    return Ok(None);
  };
  decode_dt(&raw)
    .map(Some)
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ─── Row decoding ────────────────────────────────────────────────────────────

/// An entity that can be read from a row of its table.
///
/// `COLUMNS` lists the columns in the order [`FromRow::from_row`] reads them.
pub trait FromRow: Sized {
  const TABLE: &'static str;
  const COLUMNS: &'static str;

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Every row of `T`'s table, ordered by id.
pub fn select_all<T: FromRow>(conn: &Connection) -> Result<Vec<T>> {
  let sql = format!("SELECT {} FROM {} ORDER BY id", T::COLUMNS, T::TABLE);
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map([], T::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// The row of `T`'s table with the given id, if any.
pub fn find_by_id<T: FromRow>(conn: &Connection, id: i64) -> Result<Option<T>> {
  let sql = format!("SELECT {} FROM {} WHERE id = ?1", T::COLUMNS, T::TABLE);
  Ok(conn.query_row(&sql, [id], T::from_row).optional()?)
}

/// Direct reports of `manager_id`, or the top of the hierarchy for `None`.
pub fn employees_reporting_to(conn: &Connection, manager_id: Option<i64>) -> Result<Vec<Employee>> {
  let sql = format!(
    "SELECT {} FROM employees WHERE manager_id IS ?1 ORDER BY last_name, first_name",
    Employee::COLUMNS
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map([manager_id], Employee::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

impl FromRow for Project {
  const TABLE: &'static str = "projects";
  const COLUMNS: &'static str = "id, name, path, description, created_at, updated_at";

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      name:        row.get(1)?,
      path:        row.get(2)?,
      description: row.get(3)?,
      created_at:  get_dt(row, 4)?,
      updated_at:  get_dt(row, 5)?,
    })
  }
}

impl FromRow for File {
  const TABLE: &'static str = "files";
  const COLUMNS: &'static str =
    "id, project_id, path, name, content, COALESCE(size, 0), created_at, updated_at";

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      project_id: row.get(1)?,
      path:       row.get(2)?,
      name:       row.get(3)?,
      content:    row.get(4)?,
      size:       row.get(5)?,
      created_at: get_dt(row, 6)?,
      updated_at: get_dt(row, 7)?,
    })
  }
}

impl FromRow for ProjectSettings {
  const TABLE: &'static str = "project_settings";
  const COLUMNS: &'static str = "id, project_id, COALESCE(language, 'go'), build_command, \
                                 run_command, test_command, linter_command, created_at, updated_at";

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      project_id:     row.get(1)?,
      language:       row.get(2)?,
      build_command:  row.get(3)?,
      run_command:    row.get(4)?,
      test_command:   row.get(5)?,
      linter_command: row.get(6)?,
      created_at:     get_dt(row, 7)?,
      updated_at:     get_dt(row, 8)?,
    })
  }
}

impl FromRow for FileHistory {
  const TABLE: &'static str = "file_history";
  const COLUMNS: &'static str = "id, file_id, content, change_description, created_at";

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                 row.get(0)?,
      file_id:            row.get(1)?,
      content:            row.get(2)?,
      change_description: row.get(3)?,
      created_at:         get_dt(row, 4)?,
    })
  }
}

impl FromRow for Snippet {
  const TABLE: &'static str = "snippets";
  const COLUMNS: &'static str =
    "id, title, description, language, code, tags, created_at, updated_at";

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      title:       row.get(1)?,
      description: row.get(2)?,
      language:    row.get(3)?,
      code:        row.get(4)?,
      tags:        row.get(5)?,
      created_at:  get_dt(row, 6)?,
      updated_at:  get_dt(row, 7)?,
    })
  }
}

impl FromRow for Bookmark {
  const TABLE: &'static str = "bookmarks";
  const COLUMNS: &'static str = "id, file_id, line_number, description, created_at";

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      file_id:     row.get(1)?,
      line_number: row.get(2)?,
      description: row.get(3)?,
      created_at:  get_dt(row, 4)?,
    })
  }
}

impl FromRow for Employee {
  const TABLE: &'static str = "employees";
  const COLUMNS: &'static str = "id, first_name, last_name, middle_name, email, position, \
                                 department, manager_id, phone, hire_date, created_at, updated_at";

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      first_name:  row.get(1)?,
      last_name:   row.get(2)?,
      middle_name: row.get(3)?,
      email:       row.get(4)?,
      position:    row.get(5)?,
      department:  row.get(6)?,
      manager_id:  row.get(7)?,
      phone:       row.get(8)?,
      hire_date:   get_dt(row, 9)?,
      created_at:  get_dt(row, 10)?,
      updated_at:  get_dt(row, 11)?,
    })
  }
}
