//! Startup and maintenance flows that tie the preferences file to the store.

use std::io::{self, Write};

use anyhow::{Context as _, Result, bail};
use jotnal_core::Preferences;
use jotnal_store_sqlite::{Error as StoreError, LifecycleManager, Registry};
use tracing::info;

/// Attempts allowed for entering a new password twice identically.
const PASSWORD_ATTEMPTS: usize = 3;

/// Somewhere to read a password from without echoing it.
pub trait SecretPrompt {
  fn read_secret(&mut self, prompt: &str) -> io::Result<String>;
}

/// The controlling terminal, with echo turned off while typing.
pub struct Terminal;

impl SecretPrompt for Terminal {
  fn read_secret(&mut self, prompt: &str) -> io::Result<String> {
    rpassword::prompt_password(prompt)
  }
}

/// Ask for a new password twice until both entries match and are non-empty.
pub fn read_new_password(input: &mut impl SecretPrompt, out: &mut impl Write) -> Result<String> {
  for _ in 0..PASSWORD_ATTEMPTS {
    let first = input
      .read_secret("New store password: ")
      .context("reading password")?;
    let second = input
      .read_secret("Repeat password: ")
      .context("reading password")?;
    if first.is_empty() {
      writeln!(out, "Password must not be empty, try again")?;
    } else if first != second {
      writeln!(out, "Passwords do not match, try again")?;
    } else {
      return Ok(first);
    }
  }
  bail!("no valid password entered after {PASSWORD_ATTEMPTS} attempts")
}

/// First run: make sure the preferences carry a store password.
///
/// Uses `supplied` when given, otherwise prompts. Returns true if a password
/// was set.
pub fn ensure_password(
  prefs: &mut Preferences,
  supplied: Option<&str>,
  input: &mut impl SecretPrompt,
  out: &mut impl Write,
) -> Result<bool> {
  if prefs.document().has_password() {
    return Ok(false);
  }

  let password = match supplied {
    Some(p) if !p.is_empty() => p.to_owned(),
    _ => {
      writeln!(out, "First run: choose a password for the encrypted store")?;
      read_new_password(input, out)?
    }
  };
  prefs
    .update_store_password(&password)
    .context("saving the store password")?;
  info!(prefs = %prefs.file_path().display(), "store password set");
  Ok(true)
}

/// Open the store named by the preferences, applying pending migrations.
pub fn open_store(prefs: &Preferences, registry: Registry) -> Result<LifecycleManager> {
  let doc = prefs.document();
  let path = doc.store_path();
  let mut manager = LifecycleManager::new(&path, registry);

  match manager.open(doc.store_password()) {
    Ok(report) => {
      info!(
        path = %path.display(),
        created = report.created,
        from = report.from_version,
        version = report.version,
        applied = report.applied.len(),
        "store ready"
      );
      Ok(manager)
    }
    Err(e @ StoreError::Authentication { .. }) => Err(anyhow::Error::new(e).context(format!(
      "the password saved in {} does not unlock the store",
      prefs.file_path().display()
    ))),
    Err(e) => Err(anyhow::Error::new(e).context(format!("opening store at {}", path.display()))),
  }
}

/// Rotate the store key, then persist the new password.
///
/// The preferences are only touched after the rekey succeeded, so a failed
/// rekey never leaves the saved password ahead of the store.
pub fn change_password(
  manager: &mut LifecycleManager,
  prefs: &mut Preferences,
  new_password: &str,
) -> Result<()> {
  manager
    .rotate_password(new_password)
    .context("re-encrypting the store; the old password is still in effect")?;

  prefs.update_store_password(new_password).with_context(|| {
    format!(
      "the store now uses the new password but {} could not be updated; \
       enter the new password there by hand",
      prefs.file_path().display()
    )
  })?;
  Ok(())
}

/// Print the store path, version, size, tables and migration history.
pub fn render_info(manager: &LifecycleManager, out: &mut impl Write) -> Result<()> {
  let handle = manager.handle()?;

  writeln!(out, "Path:           {}", handle.path().display())?;
  writeln!(out, "Schema version: {}", handle.version())?;
  writeln!(out, "File size:      {:.2} KiB", handle.file_size()? as f64 / 1024.0)?;

  writeln!(out, "\nTables:")?;
  for table in handle.tables()? {
    writeln!(out, "  - {table}")?;
  }

  writeln!(out, "\nMigrations:")?;
  let registry = manager.registry();
  for record in handle.applied_migrations()? {
    let description = registry
      .migrations()
      .iter()
      .find(|m| m.version == record.version)
      .map_or("(unknown to this build)", |m| m.description);
    writeln!(
      out,
      "  {:>3}  {}  {description}",
      record.version,
      record.applied_at.format("%Y-%m-%d %H:%M:%S")
    )?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::io::{BufRead, Cursor};

  use jotnal_core::PreferencesStore;

  use super::*;

  /// Feeds scripted lines through the same non-echoing reader.
  struct Scripted<R>(R);

  impl<R: BufRead> SecretPrompt for Scripted<R> {
    fn read_secret(&mut self, _prompt: &str) -> io::Result<String> {
      rpassword::read_password_from_bufread(&mut self.0)
    }
  }

  fn scripted(lines: &str) -> Scripted<Cursor<String>> { Scripted(Cursor::new(lines.to_owned())) }

  fn prefs_in(dir: &tempfile::TempDir) -> Preferences {
    let mut prefs = PreferencesStore::new(dir.path().join("config.json"))
      .load_or_init(dir.path())
      .unwrap();
    prefs.update_store_path(dir.path().join("store").join("jotnal.db")).unwrap();
    prefs
  }

  #[test]
  fn new_password_must_be_confirmed() {
    let mut input = scripted("a\nb\n\n\nsecret\nsecret\n");
    let mut out = Vec::new();
    let password = read_new_password(&mut input, &mut out).unwrap();
    assert_eq!(password, "secret");

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("do not match"));
    assert!(printed.contains("must not be empty"));
  }

  #[test]
  fn new_password_gives_up_after_attempts() {
    let mut input = scripted("a\nb\nc\nd\ne\nf\n");
    assert!(read_new_password(&mut input, &mut Vec::new()).is_err());
  }

  #[test]
  fn input_ending_before_confirmation_is_an_error() {
    let mut input = scripted("secret\n");
    assert!(read_new_password(&mut input, &mut Vec::new()).is_err());
  }

  #[test]
  fn first_run_prompts_and_persists_password() {
    let dir = tempfile::tempdir().unwrap();
    let mut prefs = prefs_in(&dir);

    let mut input = scripted("p1\np1\n");
    assert!(ensure_password(&mut prefs, None, &mut input, &mut Vec::new()).unwrap());
    assert_eq!(prefs.document().store_password(), "p1");

    // Already set: nothing is read.
    let mut empty = scripted("");
    assert!(!ensure_password(&mut prefs, None, &mut empty, &mut Vec::new()).unwrap());

    let manager = open_store(&prefs, Registry::builtin()).unwrap();
    assert_eq!(manager.version(), Some(5));
  }

  #[test]
  fn supplied_password_skips_the_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let mut prefs = prefs_in(&dir);
    let mut empty = scripted("");
    assert!(ensure_password(&mut prefs, Some("env-pw"), &mut empty, &mut Vec::new()).unwrap());
    assert_eq!(prefs.document().store_password(), "env-pw");
  }

  #[test]
  fn password_change_updates_store_then_preferences() {
    let dir = tempfile::tempdir().unwrap();
    let mut prefs = prefs_in(&dir);
    prefs.update_store_password("old").unwrap();

    let mut manager = open_store(&prefs, Registry::builtin()).unwrap();
    change_password(&mut manager, &mut prefs, "new").unwrap();
    manager.close();

    assert_eq!(prefs.document().store_password(), "new");
    let reopened = open_store(&prefs, Registry::builtin()).unwrap();
    assert!(reopened.is_ready());
  }

  #[test]
  fn failed_rekey_leaves_preferences_alone() {
    let dir = tempfile::tempdir().unwrap();
    let mut prefs = prefs_in(&dir);
    prefs.update_store_password("old").unwrap();

    let mut manager = open_store(&prefs, Registry::builtin()).unwrap();
    assert!(change_password(&mut manager, &mut prefs, "").is_err());
    assert_eq!(prefs.document().store_password(), "old");
  }

  #[test]
  fn mismatched_saved_password_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut prefs = prefs_in(&dir);
    prefs.update_store_password("one").unwrap();
    drop(open_store(&prefs, Registry::builtin()).unwrap());

    prefs.update_store_password("two").unwrap();
    let err = open_store(&prefs, Registry::builtin()).unwrap_err();
    assert!(err.to_string().contains("does not unlock the store"));
    assert!(matches!(
      err.downcast_ref::<StoreError>(),
      Some(StoreError::Authentication { .. })
    ));
  }

  #[test]
  fn info_lists_tables_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut prefs = prefs_in(&dir);
    prefs.update_store_password("p1").unwrap();
    let manager = open_store(&prefs, Registry::builtin()).unwrap();

    let mut out = Vec::new();
    render_info(&manager, &mut out).unwrap();
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("Schema version: 5"));
    assert!(printed.contains("  - employees"));
    assert!(printed.contains("hierarchical employee directory"));
  }
}
