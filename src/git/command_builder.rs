//! Builder for system `git` invocations.
//!
//! Every git call goes through [`GitCommand`], which adds a working
//! directory (`-C`), a timeout and an optional log context, captures output,
//! and maps failures onto [`ReleaseError`] variants.
//!
//! ```rust,no_run
//! use osa_releases::git::command_builder::GitCommand;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let refs = GitCommand::ls_remote("https://opendev.org/openstack/nova", "master")
//!     .with_timeout(Some(Duration::from_secs(60)))
//!     .with_context("nova")
//!     .execute_stdout()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::DEFAULT_GIT_TIMEOUT;
use crate::core::ReleaseError;

/// Name of the git executable.
pub const GIT_COMMAND: &str = if cfg!(windows) { "git.exe" } else { "git" };

/// A git command under construction.
pub struct GitCommand {
    /// Arguments after `git` (and after `-C <dir>` when a directory is set)
    args: Vec<String>,

    /// Directory passed with `-C`
    current_dir: Option<PathBuf>,

    /// Extra environment for the child process
    env_vars: Vec<(String, String)>,

    /// `None` waits forever
    timeout_duration: Option<Duration>,

    /// Label prefixed to log lines, usually the role or project name
    context: Option<String>,

    /// Remote URL, kept for clone error messages
    remote_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            // Never block on a credential prompt
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: Some(DEFAULT_GIT_TIMEOUT),
            context: None,
            remote_url: None,
        }
    }
}

impl GitCommand {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run inside `dir` (passed as `git -C <dir>`).
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a custom timeout for the command (None for no timeout)
    #[must_use]
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Set a context for logging (e.g. role name)
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn full_args(&self) -> Vec<String> {
        let mut full_args = Vec::new();
        if let Some(dir) = &self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        full_args
    }

    /// The git subcommand, skipping `-C <dir>`.
    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    fn prefix(&self) -> String {
        self.context.as_ref().map(|ctx| format!("({ctx}) ")).unwrap_or_default()
    }

    /// Execute the command and return its captured output.
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let full_args = self.full_args();
        let prefix = self.prefix();

        let mut cmd = Command::new(GIT_COMMAND);
        cmd.args(&full_args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        cmd.kill_on_drop(true);

        tracing::debug!(target: "git", "{prefix}Executing command: {GIT_COMMAND} {}", full_args.join(" "));

        let output_future = cmd.output();
        let result = match self.timeout_duration {
            Some(duration) => {
                if let Ok(result) = timeout(duration, output_future).await {
                    result
                } else {
                    tracing::warn!(
                        target: "git",
                        "{prefix}Command timed out after {} seconds: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    );
                    return Err(ReleaseError::GitCommandError {
                        operation: self.operation(),
                        stderr: format!(
                            "Git command timed out after {} seconds. This may indicate:\n\
                            - Network connectivity issues\n\
                            - Authentication prompts waiting for input\n\
                            Try running the command manually: git {}",
                            duration.as_secs(),
                            full_args.join(" ")
                        ),
                    }
                    .into());
                }
            }
            None => output_future.await,
        };

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReleaseError::GitNotFound.into());
            }
            Err(e) => {
                return Err(anyhow::Error::from(e)
                    .context(format!("Failed to execute git {}", full_args.join(" "))));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "{prefix}Command failed with exit code: {:?}",
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "{prefix}Error: {}", stderr.trim());
            }

            let error = if self.args.first().is_some_and(|arg| arg == "clone") {
                ReleaseError::GitCloneFailed {
                    url: self.remote_url.unwrap_or_else(|| "unknown".to_string()),
                    reason: stderr.trim().to_string(),
                }
            } else {
                ReleaseError::GitCommandError {
                    operation: self.operation(),
                    stderr: if stderr.trim().is_empty() { stdout } else { stderr },
                }
            };
            return Err(error.into());
        }

        if !stdout.is_empty() {
            tracing::trace!(target: "git", "{prefix}{}", stdout.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(
                target: "git::perf",
                "{prefix}Git {} took {:.2}s",
                self.operation(),
                elapsed.as_secs_f64()
            );
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Execute the command and return only stdout as a trimmed string
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Execute the command and only check for success
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Output from a git command
#[derive(Debug)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

// Convenience builders for the operations this crate needs

impl GitCommand {
    /// `git ls-remote <url> <pattern>`
    #[must_use]
    pub fn ls_remote(url: &str, pattern: &str) -> Self {
        Self::new().args(["ls-remote", url, pattern])
    }

    /// `git ls-remote --tags <url>`
    #[must_use]
    pub fn ls_remote_tags(url: &str) -> Self {
        Self::new().args(["ls-remote", "--tags", url])
    }

    /// Shallow single-branch clone without checking out files.
    #[must_use]
    pub fn clone_shallow(url: &str, branch: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args([
            "clone",
            "--depth",
            "1",
            "--no-checkout",
            "--branch",
            branch,
            url,
        ]);
        cmd.args.push(target.as_ref().display().to_string());
        cmd.remote_url = Some(url.to_string());
        cmd
    }

    /// Deepen a shallow clone with one specific commit.
    #[must_use]
    pub fn fetch_commit(sha: &str) -> Self {
        Self::new().args(["fetch", "--depth", "1", "origin", sha])
    }

    #[must_use]
    pub fn checkout(reference: &str) -> Self {
        Self::new().args(["checkout", "--quiet", reference])
    }

    /// Current branch; empty output on a detached HEAD.
    #[must_use]
    pub fn current_branch() -> Self {
        Self::new().args(["branch", "--show-current"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_args_with_directory() {
        let cmd = GitCommand::checkout("abc").current_dir("/tmp/repo");
        assert_eq!(cmd.full_args(), vec!["-C", "/tmp/repo", "checkout", "--quiet", "abc"]);
        assert_eq!(cmd.operation(), "checkout");
    }

    #[test]
    fn test_clone_keeps_url_for_errors() {
        let cmd = GitCommand::clone_shallow("https://example.org/repo", "master", "/tmp/x");
        assert_eq!(cmd.remote_url.as_deref(), Some("https://example.org/repo"));
        assert_eq!(cmd.args.last().map(String::as_str), Some("/tmp/x"));
    }

    #[test]
    fn test_context_prefix() {
        assert_eq!(GitCommand::new().with_context("os_nova").prefix(), "(os_nova) ");
        assert_eq!(GitCommand::new().prefix(), "");
    }

    #[tokio::test]
    async fn test_failure_maps_to_git_command_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = GitCommand::new()
            .args(["rev-parse", "HEAD"])
            .current_dir(temp.path())
            .execute()
            .await
            .unwrap_err();
        match err.downcast_ref::<ReleaseError>() {
            Some(ReleaseError::GitCommandError {
                operation,
                ..
            }) => assert_eq!(operation, "rev-parse"),
            Some(ReleaseError::GitNotFound) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
