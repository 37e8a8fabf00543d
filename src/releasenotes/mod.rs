//! Copying upstream release notes into the integrated repository.
//!
//! When a first-party role is bumped, its reno notes at the new SHA are copied
//! into the local notes directory so the next release carries them. Files
//! already present locally are left alone.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::constants::DEFAULT_RELEASE_NOTES_DIR;
use crate::git::GitRepo;
use crate::utils::copy_new_files;

/// File pattern of a reno note.
pub const NOTE_PATTERN: &str = "*.yaml";

/// Provides the release notes of a repository at a commit.
pub trait ReleaseNotesSource {
    /// Copy notes of `url` at `sha` (reachable from `branch`) into `dest`.
    ///
    /// Returns the files written; existing files are never overwritten.
    fn copy_notes(
        &self,
        url: &str,
        branch: &str,
        sha: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<Vec<PathBuf>>> + Send;
}

/// [`ReleaseNotesSource`] that shallow-clones the repository into a temp dir.
#[derive(Debug, Clone, Copy)]
pub struct GitReleaseNotes {
    timeout: Duration,
}

impl GitReleaseNotes {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
        }
    }
}

impl ReleaseNotesSource for GitReleaseNotes {
    async fn copy_notes(
        &self,
        url: &str,
        branch: &str,
        sha: &str,
        dest: &Path,
    ) -> Result<Vec<PathBuf>> {
        let workdir = tempfile::TempDir::new().context("Failed to create temporary clone directory")?;
        let target = workdir.path().join("repo");

        let repo = GitRepo::clone_shallow(url, branch, &target, self.timeout).await?;
        repo.checkout_commit(sha, self.timeout)
            .await
            .with_context(|| format!("Failed to check out {sha} of {url}"))?;

        let notes = repo.path().join(DEFAULT_RELEASE_NOTES_DIR);
        let copied = copy_new_files(&notes, dest, NOTE_PATTERN)?;
        debug!("Copied {} release note(s) from {url}", copied.len());
        Ok(copied)
    }
}
