//! Glob expansion for manifest discovery.
//!
//! Mutating commands address their manifests with glob patterns relative to
//! the `--root` directory, e.g. `playbooks/defaults/repo_packages/*.yml` or
//! `inventory/group_vars/*all/*_git.yml`. [`ManifestLocator`] expands a list
//! of such patterns into a deduplicated, sorted list of files.
//!
//! Wildcards never cross directory separators, except `**` which matches any
//! number of directories. Traversal starts at the deepest directory that the
//! pattern names literally and never follows symlinks.
//!
//! ```rust,no_run
//! use osa_releases::pattern::ManifestLocator;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let files = ManifestLocator::new().locate(
//!     &["playbooks/defaults/repo_packages/*.yml".to_string()],
//!     Path::new("."),
//! )?;
//! for file in &files {
//!     println!("{}", file.display());
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::core::ReleaseError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn has_glob_chars(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

/// A compiled pattern split into the literal directory it starts from and
/// the glob applied below it.
#[derive(Debug)]
struct SplitPattern {
    root: PathBuf,
    glob: Option<Pattern>,
    depth: Option<usize>,
}

impl SplitPattern {
    fn new(pattern: &str, base: &Path) -> Result<Self> {
        let path = Path::new(pattern);
        let mut root = if path.is_absolute() { PathBuf::new() } else { base.to_path_buf() };
        let mut rest: Vec<String> = Vec::new();

        for component in path.components() {
            let text = component.as_os_str().to_string_lossy();
            if rest.is_empty() && !has_glob_chars(&text) {
                match component {
                    Component::CurDir => {}
                    _ => root.push(component),
                }
            } else {
                rest.push(text.into_owned());
            }
        }

        if rest.is_empty() {
            return Ok(Self {
                root,
                glob: None,
                depth: Some(0),
            });
        }

        let depth = if rest.iter().any(|segment| segment == "**") { None } else { Some(rest.len()) };
        let joined = rest.join("/");
        let glob = Pattern::new(&joined).with_context(|| format!("Invalid glob pattern: {pattern}"))?;
        Ok(Self {
            root,
            glob: Some(glob),
            depth,
        })
    }

    fn find_matches(&self) -> Vec<PathBuf> {
        let Some(glob) = &self.glob else {
            return if self.root.is_file() { vec![self.root.clone()] } else { Vec::new() };
        };
        if !self.root.is_dir() {
            return Vec::new();
        }

        let mut walker = WalkDir::new(&self.root).follow_links(false).min_depth(1);
        if let Some(depth) = self.depth {
            walker = walker.max_depth(depth);
        }

        walker
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry.path().strip_prefix(&self.root).is_ok_and(|relative| {
                    let relative = relative.to_string_lossy().replace('\\', "/");
                    trace!("Checking path: {relative}");
                    glob.matches_with(&relative, MATCH_OPTIONS)
                })
            })
            .map(walkdir::DirEntry::into_path)
            .collect()
    }
}

/// Expands manifest glob patterns relative to a base directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestLocator;

impl ManifestLocator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Files under `base` matching any of `patterns`, deduplicated and sorted.
    ///
    /// A pattern matching nothing is logged and skipped; an empty result is
    /// not an error here.
    pub fn locate(&self, patterns: &[String], base: &Path) -> Result<Vec<PathBuf>> {
        let mut all_matches = HashSet::new();

        for pattern in patterns {
            let matches = SplitPattern::new(pattern, base)?.find_matches();
            if matches.is_empty() {
                debug!("Pattern '{pattern}' matched no files under {}", base.display());
            } else {
                debug!("Pattern '{pattern}' matched {} file(s)", matches.len());
            }
            all_matches.extend(matches);
        }

        let mut result: Vec<_> = all_matches.into_iter().collect();
        result.sort();
        Ok(result)
    }

    /// Like [`locate`](Self::locate) but fails with
    /// [`ReleaseError::ManifestNotFound`] when nothing matched.
    pub fn locate_required(&self, patterns: &[String], base: &Path) -> Result<Vec<PathBuf>> {
        let files = self.locate(patterns, base)?;
        if files.is_empty() {
            return Err(ReleaseError::ManifestNotFound {
                patterns: patterns.to_vec(),
            }
            .into());
        }
        Ok(files)
    }
}
