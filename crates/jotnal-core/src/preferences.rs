//! The preferences file: store location, store password and UI settings.
//!
//! The file is a small pretty-printed JSON document under the user's home
//! directory. Every save rewrites the whole document atomically with
//! owner-only permissions.
//!
//! The store password is kept in plaintext here. The store layer never trusts
//! it blindly; it always probes the encrypted file after keying.

use std::{
  fmt,
  io,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::{Error, Result, fs};

/// Directory under `$HOME` holding both the preferences file and the store.
pub const APP_DIR: &str = ".jotnal";
pub const PREFERENCES_FILE: &str = "config.json";
pub const STORE_FILE: &str = "jotnal.db";

pub const DEFAULT_THEME: &str = "dark";
pub const DEFAULT_FONT_SIZE: u32 = 14;
pub const DEFAULT_WINDOW_WIDTH: u32 = 1280;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 720;
pub const DEFAULT_LANGUAGE: &str = "ru";

// ─── Document ────────────────────────────────────────────────────────────────

/// The full preferences document as persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencesDocument {
  pub database:  DatabaseSection,
  pub interface: InterfaceSection,
}

/// Where the encrypted store lives and the passphrase that unlocks it.
///
/// `password` is empty only before first run. Every value it held is wiped
/// when replaced or dropped.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSection {
  pub path:     PathBuf,
  pub password: Zeroizing<String>,
}

impl fmt::Debug for DatabaseSection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DatabaseSection")
      .field("path", &self.path)
      .field("password", &if self.password.is_empty() { "<unset>" } else { "<redacted>" })
      .finish()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSection {
  pub theme:       String,
  pub font_size:   u32,
  pub window_size: WindowSize,
  pub language:    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
  pub width:  u32,
  pub height: u32,
}

impl PreferencesDocument {
  /// The first-run document for a user whose home directory is `home`.
  ///
  /// Pure: performs no I/O.
  pub fn create_default(home: &Path) -> Self {
    Self {
      database:  DatabaseSection {
        path:     home.join(APP_DIR).join(STORE_FILE),
        password: Zeroizing::default(),
      },
      interface: InterfaceSection {
        theme:       DEFAULT_THEME.to_owned(),
        font_size:   DEFAULT_FONT_SIZE,
        window_size: WindowSize {
          width:  DEFAULT_WINDOW_WIDTH,
          height: DEFAULT_WINDOW_HEIGHT,
        },
        language:    DEFAULT_LANGUAGE.to_owned(),
      },
    }
  }

  /// The store path with a leading `~/` expanded against `$HOME`.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.database.path) }

  pub fn store_password(&self) -> &str { &self.database.password }

  pub fn has_password(&self) -> bool { !self.database.password.is_empty() }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Reads and writes the preferences document at a fixed path.
#[derive(Debug, Clone)]
pub struct PreferencesStore {
  path: PathBuf,
}

impl PreferencesStore {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

  /// `$HOME/.jotnal/config.json`.
  pub fn at_default_location() -> Result<Self> {
    Ok(Self::new(home_dir()?.join(APP_DIR).join(PREFERENCES_FILE)))
  }

  pub fn path(&self) -> &Path { &self.path }

  /// Read the document. A missing file is reported as [`Error::NotFound`],
  /// distinct from every other I/O failure.
  pub fn load(&self) -> Result<PreferencesDocument> {
    let raw = std::fs::read_to_string(&self.path).map_err(|e| {
      if e.kind() == io::ErrorKind::NotFound {
        Error::NotFound { path: self.path.clone() }
      } else {
        Error::io(&self.path, e)
      }
    })?;
    let doc = serde_json::from_str(&raw)?;
    debug!(path = %self.path.display(), "loaded preferences");
    Ok(doc)
  }

  /// Rewrite the whole document. The containing directory is created with
  /// owner-only permissions if missing.
  pub fn save(&self, doc: &PreferencesDocument) -> Result<()> {
    if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_private_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    let data = serde_json::to_vec_pretty(doc)?;
    fs::write_private_atomic(&self.path, &data).map_err(|e| Error::io(&self.path, e))?;
    debug!(path = %self.path.display(), "saved preferences");
    Ok(())
  }

  /// First-run flow: load the document, or create and persist the defaults
  /// for `home` if no file exists yet. Any other failure aborts.
  pub fn load_or_init(self, home: &Path) -> Result<Preferences> {
    match self.load() {
      Ok(doc) => Ok(Preferences { store: self, doc, created: false }),
      Err(Error::NotFound { .. }) => {
        let doc = PreferencesDocument::create_default(home);
        self.save(&doc)?;
        info!(path = %self.path.display(), "created default preferences");
        Ok(Preferences { store: self, doc, created: true })
      }
      Err(e) => Err(e),
    }
  }
}

// ─── Preferences ─────────────────────────────────────────────────────────────

/// A loaded document bound to its file. Every update is persisted before it
/// becomes visible through [`Preferences::document`].
#[derive(Debug)]
pub struct Preferences {
  store:   PreferencesStore,
  doc:     PreferencesDocument,
  created: bool,
}

/// Arguments to [`Preferences::update_interface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSettings {
  pub theme:     String,
  pub font_size: u32,
  pub width:     u32,
  pub height:    u32,
  pub language:  String,
}

impl Preferences {
  pub fn document(&self) -> &PreferencesDocument { &self.doc }

  pub fn file_path(&self) -> &Path { self.store.path() }

  /// True when this run created the file from defaults.
  pub fn was_created(&self) -> bool { self.created }

  pub fn update_store_path(&mut self, path: impl Into<PathBuf>) -> Result<()> {
    let path = path.into();
    self.update(|doc| doc.database.path = path)
  }

  /// Persist a new store password. Empty passwords are refused.
  pub fn update_store_password(&mut self, password: &str) -> Result<()> {
    if password.is_empty() {
      return Err(Error::EmptyPassword);
    }
    self.update(|doc| doc.database.password = Zeroizing::new(password.to_owned()))
  }

  pub fn update_interface(&mut self, settings: InterfaceSettings) -> Result<()> {
    self.update(|doc| {
      doc.interface.theme = settings.theme;
      doc.interface.font_size = settings.font_size;
      doc.interface.window_size = WindowSize {
        width:  settings.width,
        height: settings.height,
      };
      doc.interface.language = settings.language;
    })
  }

  fn update(&mut self, mutate: impl FnOnce(&mut PreferencesDocument)) -> Result<()> {
    let mut next = self.doc.clone();
    mutate(&mut next);
    self.store.save(&next)?;
    self.doc = next;
    Ok(())
  }
}

// ─── Paths ───────────────────────────────────────────────────────────────────

/// The current user's home directory, from `$HOME`.
pub fn home_dir() -> Result<PathBuf> {
  std::env::var_os("HOME")
    .filter(|h| !h.is_empty())
    .map(PathBuf::from)
    .ok_or(Error::NoHomeDir)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  if let Ok(rest) = path.strip_prefix("~")
    && let Ok(home) = home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store_in(dir: &tempfile::TempDir) -> PreferencesStore {
    PreferencesStore::new(dir.path().join("nested").join(PREFERENCES_FILE))
  }

  #[test]
  fn defaults_are_derived_from_home() {
    let doc = PreferencesDocument::create_default(Path::new("/home/u"));
    assert_eq!(doc.database.path, Path::new("/home/u/.jotnal/jotnal.db"));
    assert!(!doc.has_password());
    assert_eq!(doc.interface.theme, "dark");
    assert_eq!(doc.interface.font_size, 14);
    assert_eq!(doc.interface.window_size, WindowSize { width: 1280, height: 720 });
    assert_eq!(doc.interface.language, "ru");
  }

  #[test]
  fn load_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = store_in(&dir).load().unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "{err:?}");
  }

  #[test]
  fn first_run_persists_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path();

    let prefs = store_in(&dir).load_or_init(home).unwrap();
    assert!(prefs.was_created());
    assert_eq!(prefs.document(), &PreferencesDocument::create_default(home));

    let reloaded = store_in(&dir).load().unwrap();
    assert_eq!(reloaded, PreferencesDocument::create_default(home));

    let again = store_in(&dir).load_or_init(home).unwrap();
    assert!(!again.was_created());
  }

  #[test]
  fn corrupt_file_is_not_treated_as_first_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "{ not json").unwrap();

    let err = store.load_or_init(dir.path()).unwrap_err();
    assert!(matches!(err, Error::Json(_)), "{err:?}");
  }

  #[test]
  fn on_disk_shape_uses_nested_sections() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store.save(&PreferencesDocument::create_default(dir.path())).unwrap();

    let raw: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(raw["database"]["password"], "");
    assert_eq!(raw["interface"]["font_size"], 14);
    assert_eq!(raw["interface"]["window_size"]["width"], 1280);
  }

  #[test]
  fn updates_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let mut prefs = store_in(&dir).load_or_init(dir.path()).unwrap();

    prefs.update_store_password("s3cret").unwrap();
    prefs.update_store_path("/data/other.db").unwrap();
    prefs
      .update_interface(InterfaceSettings {
        theme:     "light".into(),
        font_size: 16,
        width:     1920,
        height:    1080,
        language:  "en".into(),
      })
      .unwrap();

    let reloaded = store_in(&dir).load().unwrap();
    assert_eq!(&reloaded, prefs.document());
    assert_eq!(reloaded.store_password(), "s3cret");
    assert_eq!(reloaded.database.path, Path::new("/data/other.db"));
    assert_eq!(reloaded.interface.window_size.height, 1080);
    assert_eq!(reloaded.interface.language, "en");
  }

  #[test]
  fn empty_password_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut prefs = store_in(&dir).load_or_init(dir.path()).unwrap();
    prefs.update_store_password("first").unwrap();

    let err = prefs.update_store_password("").unwrap_err();
    assert!(matches!(err, Error::EmptyPassword));
    assert_eq!(store_in(&dir).load().unwrap().store_password(), "first");
  }

  #[test]
  fn failed_save_leaves_document_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut prefs = store_in(&dir).load_or_init(dir.path()).unwrap();

    // Swap the directory for a plain file so the next save cannot land.
    let parent = prefs.file_path().parent().unwrap().to_path_buf();
    std::fs::remove_dir_all(&parent).unwrap();
    std::fs::write(&parent, b"").unwrap();

    assert!(prefs.update_store_password("never").is_err());
    assert!(!prefs.document().has_password());
  }

  #[cfg(unix)]
  #[test]
  fn saved_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let prefs = store_in(&dir).load_or_init(dir.path()).unwrap();
    let mode = std::fs::metadata(prefs.file_path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
  }

  #[test]
  fn password_field_reads_and_writes_as_a_plain_string() {
    let dir = tempfile::tempdir().unwrap();
    let mut prefs = store_in(&dir).load_or_init(dir.path()).unwrap();
    prefs.update_store_password("first").unwrap();
    prefs.update_store_password("second").unwrap();

    let raw: serde_json::Value =
      serde_json::from_slice(&std::fs::read(prefs.file_path()).unwrap()).unwrap();
    assert_eq!(raw["database"]["password"], "second");
    assert_eq!(store_in(&dir).load().unwrap().store_password(), "second");
  }

  #[test]
  fn debug_output_redacts_password() {
    let mut doc = PreferencesDocument::create_default(Path::new("/h"));
    doc.database.password = Zeroizing::new("hunter2".to_owned());
    let rendered = format!("{doc:?}");
    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("<redacted>"));
  }
}
