//! Owner-only filesystem helpers shared by the preferences file and the store.

use std::{
  fs,
  io::{self, Write as _},
  path::Path,
};

use tempfile::NamedTempFile;

/// Create `path` and any missing parents with mode 0700 on Unix.
///
/// An existing directory with looser permissions is tightened to 0700.
pub fn create_private_dir_all(path: &Path) -> io::Result<()> {
  #[cfg(unix)]
  {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)?;
    let metadata = fs::metadata(path)?;
    if !metadata.is_dir() {
      return Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("not a directory: {}", path.display()),
      ));
    }
    let mut perms = metadata.permissions();
    if perms.mode() & 0o777 != 0o700 {
      perms.set_mode(0o700);
      fs::set_permissions(path, perms)?;
    }
  }
  #[cfg(not(unix))]
  {
    fs::create_dir_all(path)?;
  }
  Ok(())
}

/// Replace `path` with `data` so readers see either the old or the new
/// content, never a prefix of it. The file ends up owner-only.
pub fn write_private_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
  let parent = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or_else(|| Path::new("."));

  // Randomly named sibling, so a leftover from a crash never blocks a save.
  let mut temp = NamedTempFile::new_in(parent)?;
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    temp.as_file().set_permissions(fs::Permissions::from_mode(0o600))?;
  }
  temp.write_all(data)?;
  temp.as_file().sync_all()?;
  temp.persist(path).map_err(|e| e.error)?;

  // Make the rename itself durable.
  #[cfg(unix)]
  if let Ok(dir) = fs::File::open(parent) {
    dir.sync_all().ok();
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn atomic_write_replaces_content_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.json");

    write_private_atomic(&path, b"first").unwrap();
    write_private_atomic(&path, b"second").unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"second");
    let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
  }

  #[cfg(unix)]
  #[test]
  fn private_dir_and_file_modes() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    create_private_dir_all(&nested).unwrap();
    let mode = fs::metadata(&nested).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);

    let file = nested.join("f");
    write_private_atomic(&file, b"x").unwrap();
    let mode = fs::metadata(&file).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
  }

  #[test]
  fn stale_temp_files_do_not_block_a_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(dir.path().join("config.json.0.tmp"), b"left over").unwrap();
    fs::write(dir.path().join(".tmpAAAAAA"), b"left over").unwrap();

    write_private_atomic(&path, b"{}").unwrap();
    write_private_atomic(&path, b"{\"a\":1}").unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"{\"a\":1}");
  }

  #[test]
  fn missing_parent_is_an_error_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent").join("config.json");
    assert!(write_private_atomic(&path, b"{}").is_err());
    assert!(!path.exists());
  }

  #[test]
  fn creating_an_existing_private_dir_is_fine() {
    let dir = tempfile::tempdir().unwrap();
    create_private_dir_all(dir.path()).unwrap();
    create_private_dir_all(dir.path()).unwrap();
  }
}
