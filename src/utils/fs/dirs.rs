//! Directory creation and non-overwriting copies.

use anyhow::{Context, Result};
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};

/// Ensure `path` exists as a directory, creating parents as needed.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| {
            format!(
                "Failed to create directory: {}\n\nCheck directory permissions and path validity",
                path.display()
            )
        })?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Copy files of `src` whose names match `pattern` into `dst`, skipping names
/// that already exist in `dst`. Not recursive.
///
/// Returns the destination paths that were created, sorted.
pub fn copy_new_files(src: &Path, dst: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern =
        Pattern::new(pattern).with_context(|| format!("Invalid file pattern: {pattern}"))?;
    if !src.is_dir() {
        return Ok(Vec::new());
    }
    ensure_dir(dst)?;

    let mut copied = Vec::new();
    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        if !entry.file_type()?.is_file() || !pattern.matches(&name.to_string_lossy()) {
            continue;
        }

        let target = dst.join(&name);
        if target.exists() {
            tracing::debug!("Keeping existing {}", target.display());
            continue;
        }
        fs::copy(entry.path(), &target).with_context(|| {
            format!("Failed to copy {} to {}", entry.path().display(), target.display())
        })?;
        copied.push(target);
    }

    copied.sort();
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_dir_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        fs::write(&file, "").unwrap();
        assert!(ensure_dir(&file).is_err());
        ensure_dir(&temp.path().join("a/b/c")).unwrap();
        assert!(temp.path().join("a/b/c").is_dir());
    }

    #[test]
    fn test_copy_new_files_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join("new-feature-1234.yaml"), "upstream").unwrap();
        fs::write(src.join("existing-5678.yaml"), "upstream").unwrap();
        fs::write(src.join("notes.txt"), "ignored").unwrap();
        fs::write(dst.join("existing-5678.yaml"), "local").unwrap();

        let copied = copy_new_files(&src, &dst, "*.yaml").unwrap();

        assert_eq!(copied, vec![dst.join("new-feature-1234.yaml")]);
        assert_eq!(fs::read_to_string(dst.join("existing-5678.yaml")).unwrap(), "local");
        assert!(!dst.join("notes.txt").exists());
    }

    #[test]
    fn test_copy_new_files_missing_source() {
        let temp = TempDir::new().unwrap();
        let copied =
            copy_new_files(&temp.path().join("nope"), &temp.path().join("dst"), "*.yaml").unwrap();
        assert!(copied.is_empty());
    }
}
