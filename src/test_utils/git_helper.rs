//! Git test helper utilities
//!
//! Builds throwaway local repositories that stand in for role and collection
//! remotes. `git ls-remote` and `git clone` accept plain paths and `file://`
//! URLs, so no network is needed.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::process::Command;

/// Git command runner for tests
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Initialize a repository at `path` with one commit on `branch`.
    ///
    /// The repository gets a `README.md` and a `releasenotes/notes/` directory
    /// so it can double as a role remote.
    pub fn init_with_commit(path: impl Into<PathBuf>, branch: &str) -> Result<Self> {
        let git = Self::new(path);
        std::fs::create_dir_all(&git.repo_path)?;
        git.init()?;
        git.config_user()?;
        std::fs::write(git.repo_path.join("README.md"), "# test role\n")?;
        git.add_all()?;
        git.commit("Initial commit")?;
        git.run_git_command(&["branch", "-M", branch], &format!("Failed to rename branch to {branch}"))?;
        Ok(git)
    }

    pub fn init(&self) -> Result<()> {
        self.run_git_command(&["init"], "Failed to initialize git repository")?;
        Ok(())
    }

    pub fn config_user(&self) -> Result<()> {
        self.run_git_command(
            &["config", "user.email", "test@osa-releases.example"],
            "Failed to configure git user email",
        )?;
        self.run_git_command(
            &["config", "user.name", "Test User"],
            "Failed to configure git user name",
        )?;
        self.run_git_command(&["config", "commit.gpgsign", "false"], "Failed to disable signing")?;
        Ok(())
    }

    pub fn add_all(&self) -> Result<()> {
        self.run_git_command(&["add", "."], "Failed to add files to git")?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.run_git_command(&["commit", "-m", message], "Failed to create git commit")?;
        Ok(())
    }

    /// Write `content` to `relative` and commit it. Returns the new HEAD.
    pub fn commit_file(&self, relative: &str, content: &str) -> Result<String> {
        let path = self.repo_path.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        self.add_all()?;
        self.commit(&format!("Add {relative}"))?;
        self.rev_parse_head()
    }

    /// Lightweight tag
    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {tag_name}"))?;
        Ok(())
    }

    /// Annotated tag, listed by ls-remote with a peeled `^{}` entry
    pub fn tag_annotated(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(
            &["tag", "-a", tag_name, "-m", tag_name],
            &format!("Failed to create tag: {tag_name}"),
        )?;
        Ok(())
    }

    pub fn rev_parse_head(&self) -> Result<String> {
        let output =
            self.run_git_command(&["rev-parse", "HEAD"], "Failed to get current commit SHA")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// `file://` URL of this repository, usable as a role `src`.
    pub fn url(&self) -> String {
        format!("file://{}", self.repo_path.display())
    }
}
