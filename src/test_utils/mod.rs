//! Test utilities for osa-releases
//!
//! In-memory stand-ins for every network seam, a local git repository
//! builder, and one-time logging setup. Enabled for the crate's own tests and
//! for downstream tests through the `test-utils` feature.

pub mod git_helper;

pub use git_helper::TestGit;

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::git::RefResolver;
use crate::releasenotes::ReleaseNotesSource;
use crate::upstream::{CollectionIndex, FileFetcher, PackageIndex};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// [`PackageIndex`] answering from a fixed table.
#[derive(Debug, Default)]
pub struct FakePackageIndex {
    versions: HashMap<String, String>,
    failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakePackageIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_version(mut self, name: &str, version: &str) -> Self {
        self.versions.insert(name.to_string(), version.to_string());
        self
    }

    /// Make the first `times` lookups of `name` fail.
    #[must_use]
    pub fn failing_first(self, name: &str, times: usize) -> Self {
        lock(&self.failures).insert(name.to_string(), times);
        self
    }

    /// Number of lookups issued for `name`.
    pub fn calls(&self, name: &str) -> usize {
        lock(&self.calls).get(name).copied().unwrap_or(0)
    }
}

impl PackageIndex for FakePackageIndex {
    async fn resolve_latest(&self, name: &str) -> Result<String> {
        *lock(&self.calls).entry(name.to_string()).or_insert(0) += 1;
        {
            let mut failures = lock(&self.failures);
            if let Some(remaining) = failures.get_mut(name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(anyhow!("simulated outage for {name}"));
                }
            }
        }
        self.versions.get(name).cloned().ok_or_else(|| anyhow!("HTTP 404 Not Found for {name}"))
    }
}

/// [`CollectionIndex`] answering from a fixed table.
#[derive(Debug, Default)]
pub struct FakeCollectionIndex {
    versions: HashMap<String, String>,
}

impl FakeCollectionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_version(mut self, fqcn: &str, version: &str) -> Self {
        self.versions.insert(fqcn.to_string(), version.to_string());
        self
    }
}

impl CollectionIndex for FakeCollectionIndex {
    async fn latest_collection(&self, fqcn: &str) -> Result<String> {
        self.versions.get(fqcn).cloned().ok_or_else(|| anyhow!("collection {fqcn} not on galaxy"))
    }
}

/// [`FileFetcher`] serving files keyed by reference and path.
#[derive(Debug, Default)]
pub struct FakeFileFetcher {
    files: HashMap<(String, String), String>,
}

impl FakeFileFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(mut self, reference: &str, path: &str, content: &str) -> Self {
        self.files.insert((reference.to_string(), path.to_string()), content.to_string());
        self
    }
}

impl FileFetcher for FakeFileFetcher {
    async fn fetch_file(&self, reference: &str, path: &str) -> Result<String> {
        self.files
            .get(&(reference.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("HTTP 404 Not Found"))
    }
}

/// [`RefResolver`] with scripted branch heads and tag lists.
#[derive(Debug, Default)]
pub struct FakeRefResolver {
    refs: HashMap<(String, String), String>,
    tags: HashMap<String, Vec<String>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeRefResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ref(mut self, url: &str, reference: &str, sha: &str) -> Self {
        self.refs.insert((url.to_string(), reference.to_string()), sha.to_string());
        self
    }

    #[must_use]
    pub fn with_tags(mut self, url: &str, tags: &[&str]) -> Self {
        self.tags.insert(url.to_string(), tags.iter().map(ToString::to_string).collect());
        self
    }

    /// `(url, reference)` pairs passed to `resolve_ref`, in call order.
    pub fn resolved(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }
}

impl RefResolver for FakeRefResolver {
    async fn resolve_ref(&self, url: &str, reference: &str) -> Result<String> {
        lock(&self.calls).push((url.to_string(), reference.to_string()));
        self.refs
            .get(&(url.to_string(), reference.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("{reference} not found on {url}"))
    }

    async fn list_tags(&self, url: &str) -> Result<Vec<String>> {
        self.tags.get(url).cloned().ok_or_else(|| anyhow!("could not read tags of {url}"))
    }
}

/// A release-notes copy recorded by [`FakeReleaseNotes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesCopy {
    pub url: String,
    pub branch: String,
    pub sha: String,
}

/// [`ReleaseNotesSource`] that records requests and writes one note per copy.
#[derive(Debug, Default)]
pub struct FakeReleaseNotes {
    copies: Mutex<Vec<NotesCopy>>,
}

impl FakeReleaseNotes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copies(&self) -> Vec<NotesCopy> {
        lock(&self.copies).clone()
    }
}

impl ReleaseNotesSource for FakeReleaseNotes {
    async fn copy_notes(
        &self,
        url: &str,
        branch: &str,
        sha: &str,
        dest: &Path,
    ) -> Result<Vec<PathBuf>> {
        lock(&self.copies).push(NotesCopy {
            url: url.to_string(),
            branch: branch.to_string(),
            sha: sha.to_string(),
        });
        std::fs::create_dir_all(dest)?;
        let note = dest.join(format!("note-{}.yaml", &sha[..sha.len().min(8)]));
        if note.exists() {
            return Ok(Vec::new());
        }
        std::fs::write(&note, "---\nfeatures:\n  - test\n")?;
        Ok(vec![note])
    }
}
