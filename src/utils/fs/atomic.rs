//! Atomic file writes using the temp-and-rename strategy.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::dirs::ensure_dir;

/// Sibling temp path: `dir/.name.tmp`, so the rename never crosses filesystems.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path.file_name().map_or_else(|| "manifest".into(), |n| n.to_string_lossy());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Atomically replace `path` with `content`.
///
/// The content goes to a temp file next to the target, is synced to disk,
/// then renamed over the target. Permissions of an existing target are kept.
/// Parent directories are created when missing.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    let temp_path = temp_path_for(path);
    let permissions = fs::metadata(path).ok().map(|m| m.permissions());

    {
        let mut file = fs::File::create(&temp_path).with_context(|| {
            format!(
                "Failed to create temp file: {}\n\nCheck file permissions and that directory exists",
                temp_path.display()
            )
        })?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    if let Some(permissions) = permissions {
        fs::set_permissions(&temp_path, permissions).with_context(|| {
            format!("Failed to copy permissions onto temp file: {}", temp_path.display())
        })?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("Failed to rename temp file to: {}", path.display()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_and_replaces() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/roles.yml");

        atomic_write(&path, b"first").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");

        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!temp_path_for(&path).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("script.yml");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        atomic_write(&path, b"new").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_atomic_write_fails_when_temp_path_is_taken() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.yml");
        fs::write(&path, "old").unwrap();
        fs::create_dir(temp_path_for(&path)).unwrap();

        let err = atomic_write(&path, b"new").unwrap_err();

        assert!(format!("{err:#}").contains("Failed to create temp file"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
    }
}
