//! Entity shapes of the relational schema.
//!
//! These mirror the tables created by the store's migrations one-to-one.
//! Consumers query the live connection directly and map rows into these
//! types; nothing here performs I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Projects ────────────────────────────────────────────────────────────────

/// A project tracked by the IDE. `path` is unique across all projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
  pub id:          i64,
  pub name:        String,
  pub path:        String,
  pub description: Option<String>,
  pub created_at:  Option<DateTime<Utc>>,
  pub updated_at:  Option<DateTime<Utc>>,
}

/// A file belonging to a project. Deleted together with its project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
  pub id:         i64,
  pub project_id: i64,
  pub path:       String,
  pub name:       String,
  pub content:    Option<String>,
  pub size:       i64,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// Per-project build configuration; at most one row per project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
  pub id:             i64,
  pub project_id:     i64,
  pub language:       String,
  pub build_command:  Option<String>,
  pub run_command:    Option<String>,
  pub test_command:   Option<String>,
  pub linter_command: Option<String>,
  pub created_at:     Option<DateTime<Utc>>,
  pub updated_at:     Option<DateTime<Utc>>,
}

/// A snapshot of a file's content taken when it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHistory {
  pub id:                 i64,
  pub file_id:            i64,
  pub content:            Option<String>,
  pub change_description: Option<String>,
  pub created_at:         Option<DateTime<Utc>>,
}

// ─── Snippets and bookmarks ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
  pub id:          i64,
  pub title:       String,
  pub description: Option<String>,
  pub language:    String,
  pub code:        String,
  /// Free-form, comma separated.
  pub tags:        Option<String>,
  pub created_at:  Option<DateTime<Utc>>,
  pub updated_at:  Option<DateTime<Utc>>,
}

impl Snippet {
  /// Split the stored tag string into trimmed, non-empty tags.
  pub fn tag_list(&self) -> Vec<&str> {
    self
      .tags
      .as_deref()
      .unwrap_or_default()
      .split(',')
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .collect()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
  pub id:          i64,
  pub file_id:     i64,
  pub line_number: i64,
  pub description: Option<String>,
  pub created_at:  Option<DateTime<Utc>>,
}

// ─── Employee directory ──────────────────────────────────────────────────────

/// A member of the hierarchical employee directory.
///
/// `manager_id` references another employee and is `None` for the head of the
/// hierarchy. Deleting a manager sets their reports' `manager_id` to `NULL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
  pub id:          i64,
  pub first_name:  String,
  pub last_name:   String,
  pub middle_name: Option<String>,
  pub email:       Option<String>,
  pub position:    String,
  pub department:  Option<String>,
  pub manager_id:  Option<i64>,
  pub phone:       Option<String>,
  pub hire_date:   Option<DateTime<Utc>>,
  pub created_at:  Option<DateTime<Utc>>,
  pub updated_at:  Option<DateTime<Utc>>,
}

impl Employee {
  /// "Last First Middle", skipping an absent middle name.
  pub fn full_name(&self) -> String {
    match self.middle_name.as_deref().filter(|m| !m.is_empty()) {
      Some(middle) => format!("{} {} {}", self.last_name, self.first_name, middle),
      None => format!("{} {}", self.last_name, self.first_name),
    }
  }

  pub fn is_top_level(&self) -> bool { self.manager_id.is_none() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn employee(middle: Option<&str>, manager_id: Option<i64>) -> Employee {
    let now = Utc::now();
    Employee {
      id: 1,
      first_name: "Ivan".into(),
      last_name: "Petrov".into(),
      middle_name: middle.map(Into::into),
      email: None,
      position: "Engineer".into(),
      department: None,
      manager_id,
      phone: None,
      hire_date: Some(now),
      created_at: Some(now),
      updated_at: Some(now),
    }
  }

  #[test]
  fn full_name_skips_missing_middle_name() {
    assert_eq!(employee(None, None).full_name(), "Petrov Ivan");
    assert_eq!(employee(Some(""), None).full_name(), "Petrov Ivan");
    assert_eq!(
      employee(Some("Sergeevich"), None).full_name(),
      "Petrov Ivan Sergeevich"
    );
  }

  #[test]
  fn top_level_means_no_manager() {
    assert!(employee(None, None).is_top_level());
    assert!(!employee(None, Some(7)).is_top_level());
  }

  #[test]
  fn snippet_tags_are_split_and_trimmed() {
    let now = Utc::now();
    let snippet = Snippet {
      id: 1,
      title: "t".into(),
      description: None,
      language: "rust".into(),
      code: "fn main() {}".into(),
      tags: Some(" cli, ,io ,".into()),
      created_at: Some(now),
      updated_at: None,
    };
    assert_eq!(snippet.tag_list(), ["cli", "io"]);
  }
}
