//! Git plumbing through the system `git` binary.
//!
//! Two kinds of operation are needed:
//!
//! - remote reference lookups (`git ls-remote`) to turn a branch or tag into a
//!   commit SHA, and to list the tags of a collection repository
//! - a throwaway shallow clone of a role repository, checked out at a SHA, to
//!   copy its release notes
//!
//! Remote lookups sit behind the [`RefResolver`] trait so the role and
//! collection bumpers can be tested without a network. [`GitRefResolver`] is
//! the production implementation.
//!
//! Shelling out keeps authentication identical to what the operator's own
//! `git` does (SSH agent, credential helpers, `~/.gitconfig` rewrites).

pub mod command_builder;


use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::DEFAULT_GIT_TIMEOUT;
use crate::core::ReleaseError;
use crate::manifest::is_sha;
pub use command_builder::{GIT_COMMAND, GitCommand};

/// Resolves remote references without a local clone.
pub trait RefResolver {
    /// Commit SHA that `reference` (branch or tag) points at on `url`.
    fn resolve_ref(&self, url: &str, reference: &str) -> impl Future<Output = Result<String>> + Send;

    /// Tag names published by `url`, without the `refs/tags/` prefix.
    fn list_tags(&self, url: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// [`RefResolver`] backed by `git ls-remote`.
#[derive(Debug, Clone, Copy)]
pub struct GitRefResolver {
    timeout: Duration,
}

impl Default for GitRefResolver {
    fn default() -> Self {
        Self::new(DEFAULT_GIT_TIMEOUT)
    }
}

impl GitRefResolver {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
        }
    }
}

impl RefResolver for GitRefResolver {
    async fn resolve_ref(&self, url: &str, reference: &str) -> Result<String> {
        if is_sha(reference) {
            return Ok(reference.to_string());
        }

        let output = GitCommand::ls_remote(url, reference)
            .with_timeout(Some(self.timeout))
            .with_context(reference)
            .execute_stdout()
            .await
            .with_context(|| format!("Failed to query {url} for '{reference}'"))?;

        select_ref(&parse_ls_remote(&output), reference).ok_or_else(|| {
            ReleaseError::ReferenceNotFound {
                url: url.to_string(),
                reference: reference.to_string(),
            }
            .into()
        })
    }

    async fn list_tags(&self, url: &str) -> Result<Vec<String>> {
        let output = GitCommand::ls_remote_tags(url)
            .with_timeout(Some(self.timeout))
            .execute_stdout()
            .await
            .with_context(|| format!("Failed to list tags of {url}"))?;
        Ok(tag_names(&parse_ls_remote(&output)))
    }
}

/// One `<sha>\t<refname>` line of `git ls-remote` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub sha: String,
    pub name: String,
}

/// Parse `git ls-remote` output, ignoring malformed lines.
#[must_use]
pub fn parse_ls_remote(output: &str) -> Vec<RemoteRef> {
    output
        .lines()
        .filter_map(|line| {
            let (sha, name) = line.split_once('\t')?;
            let sha = sha.trim();
            is_sha(sha).then(|| RemoteRef {
                sha: sha.to_string(),
                name: name.trim().to_string(),
            })
        })
        .collect()
}

/// Pick the commit for `reference` among ls-remote results.
///
/// Branches win over tags. An annotated tag resolves to its peeled
/// (`^{}`) commit rather than the tag object.
fn select_ref(refs: &[RemoteRef], reference: &str) -> Option<String> {
    let short = reference.strip_prefix("refs/heads/").unwrap_or(reference);
    let candidates = [
        format!("refs/heads/{short}"),
        format!("refs/tags/{short}^{{}}"),
        format!("refs/tags/{short}"),
        reference.to_string(),
    ];
    candidates
        .iter()
        .find_map(|wanted| refs.iter().find(|r| &r.name == wanted))
        .map(|r| r.sha.clone())
}

/// Distinct tag names in ls-remote order, peeled entries folded.
#[must_use]
pub fn tag_names(refs: &[RemoteRef]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for r in refs {
        let Some(tag) = r.name.strip_prefix("refs/tags/") else {
            continue;
        };
        let tag = tag.strip_suffix("^{}").unwrap_or(tag);
        if !names.iter().any(|n| n == tag) {
            names.push(tag.to_string());
        }
    }
    names
}

/// Highest stable semantic-version tag, returned as written (a leading `v` kept).
///
/// Pre-releases and tags that are not semver are ignored.
#[must_use]
pub fn highest_semver_tag<'a, I>(tags: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    tags.into_iter()
        .filter_map(|tag| {
            let bare = tag.strip_prefix('v').unwrap_or(tag);
            let version = semver::Version::parse(bare).ok()?;
            version.pre.is_empty().then_some((version, tag))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, tag)| tag.to_string())
}

/// A local working copy.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Shallow single-branch clone of `url` at `branch` into `target`.
    pub async fn clone_shallow(
        url: &str,
        branch: &str,
        target: impl AsRef<Path>,
        timeout: Duration,
    ) -> Result<Self> {
        let target = target.as_ref();
        GitCommand::clone_shallow(url, branch, target)
            .with_timeout(Some(timeout))
            .execute_success()
            .await?;
        Ok(Self::new(target))
    }

    /// Check out `sha`, fetching it first when the shallow history lacks it.
    pub async fn checkout_commit(&self, sha: &str, timeout: Duration) -> Result<()> {
        let first = GitCommand::checkout(sha).current_dir(&self.path).execute_success().await;
        if first.is_ok() {
            return Ok(());
        }

        tracing::debug!(target: "git", "{sha} not in shallow clone, fetching it");
        GitCommand::fetch_commit(sha)
            .current_dir(&self.path)
            .with_timeout(Some(timeout))
            .execute_success()
            .await?;
        GitCommand::checkout(sha).current_dir(&self.path).execute_success().await
    }

    /// Current branch, or `None` on a detached HEAD.
    pub async fn current_branch(&self) -> Result<Option<String>> {
        let branch = GitCommand::current_branch().current_dir(&self.path).execute_stdout().await?;
        Ok((!branch.is_empty()).then_some(branch))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether a working `git` binary is on `PATH`.
#[must_use]
pub fn is_git_installed() -> bool {
    std::process::Command::new(GIT_COMMAND)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Fail with [`ReleaseError::GitNotFound`] when git is missing.
pub fn ensure_git_available() -> Result<()> {
    if !is_git_installed() {
        return Err(ReleaseError::GitNotFound.into());
    }
    Ok(())
}
