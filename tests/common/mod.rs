//! Shared helpers for the osa-releases integration tests.
//!
//! A [`TestProject`] is a throwaway openstack-ansible checkout: manifests are
//! written into a temp directory and the binary runs with `--root` pointed at
//! it. Role and service remotes are local git repositories built with
//! [`TestGit`].

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub use osa_releases::test_utils::git_helper::TestGit;

/// Temporary checkout plus a directory for fake upstream repositories.
pub struct TestProject {
    _temp_dir: TempDir,
    project_dir: PathBuf,
    remotes_dir: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let project_dir = temp_dir.path().join("openstack-ansible");
        let remotes_dir = temp_dir.path().join("remotes");
        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(&remotes_dir)?;
        Ok(Self {
            _temp_dir: temp_dir,
            project_dir,
            remotes_dir,
        })
    }

    pub fn project_path(&self) -> &Path {
        &self.project_dir
    }

    /// Write `content` to `relative` inside the checkout, creating parents.
    pub fn write_file(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.project_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {relative}"))?;
        Ok(path)
    }

    pub fn read_file(&self, relative: &str) -> Result<String> {
        fs::read_to_string(self.project_dir.join(relative))
            .with_context(|| format!("Failed to read {relative}"))
    }

    /// Create an upstream repository with one commit on `branch`.
    pub fn create_remote(&self, name: &str, branch: &str) -> Result<TestGit> {
        TestGit::init_with_commit(self.remotes_dir.join(name), branch)
    }

    /// Binary invocation with `--root` set to the checkout, for `assert()` chains.
    pub fn command(&self, args: &[&str]) -> Result<Command> {
        let mut cmd = Command::cargo_bin("osa-releases")?;
        cmd.arg("--root")
            .arg(&self.project_dir)
            .args(args)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        Ok(cmd)
    }

    /// Run the binary and capture its output.
    pub fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.command(args)?.output()?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

/// Captured output of one invocation.
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        assert!(
            self.success,
            "Command failed with code {:?}\nStdout: {}\nStderr: {}",
            self.code, self.stdout, self.stderr
        );
        self
    }

    pub fn assert_failure(&self) -> &Self {
        assert!(!self.success, "Command unexpectedly succeeded\nStdout: {}", self.stdout);
        assert_eq!(self.code, Some(1), "Stderr: {}", self.stderr);
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Expected stdout to contain '{text}'\nActual stdout: {}",
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Expected stderr to contain '{text}'\nActual stderr: {}",
            self.stderr
        );
        self
    }
}

/// Role file entry tracking `branch` of a local remote.
pub fn role_entry(name: &str, remote: &TestGit, version: &str, trackbranch: &str) -> String {
    format!(
        "- name: {name}\n  scm: git\n  src: {}\n  version: {version}\n  trackbranch: {trackbranch}\n",
        remote.url()
    )
}

pub fn git_available() -> bool {
    osa_releases::git::is_git_installed()
}
