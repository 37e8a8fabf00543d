//! Upstream service SHA bumping (`bump_upstream_shas`).
//!
//! A service manifest declares each project with a group of top-level keys:
//!
//! ```yaml
//! nova_git_repo: https://opendev.org/openstack/nova
//! nova_git_install_branch: 5b0ae1d2c3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8 # HEAD of "master" as of 01.02.2025
//! nova_git_track_branch: master
//! ```
//!
//! `<project>_git_install_branch` is moved to the head of
//! `<project>_git_track_branch` and the `HEAD of` comment gets today's date.
//! Projects whose track branch is missing or `None` are left alone.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::git::RefResolver;
use crate::manifest::locate::top_level_scalars;
use crate::manifest::{Edit, FieldPath, FileEdits, RewriteOutcome, Rewriter};

const REPO_SUFFIX: &str = "_git_repo";
const INSTALL_SUFFIX: &str = "_git_install_branch";
const TRACK_SUFFIX: &str = "_git_track_branch";

/// One project found in a service manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceProject {
    pub name: String,
    pub repo: String,
    pub install_branch: Option<String>,
    pub track_branch: Option<String>,
}

impl ServiceProject {
    fn install_key(&self) -> String {
        format!("{}{INSTALL_SUFFIX}", self.name)
    }
}

/// Projects declared in `text`, in file order.
#[must_use]
pub fn projects(text: &str) -> Vec<ServiceProject> {
    let scalars = top_level_scalars(text);
    let value_of = |key: String| {
        scalars.iter().find(|(k, _)| *k == key).map(|(_, found)| found.value.clone())
    };

    scalars
        .iter()
        .filter_map(|(key, found)| {
            let name = key.strip_suffix(REPO_SUFFIX)?;
            Some(ServiceProject {
                name: name.to_string(),
                repo: found.value.clone(),
                install_branch: value_of(format!("{name}{INSTALL_SUFFIX}")),
                track_branch: value_of(format!("{name}{TRACK_SUFFIX}"))
                    .filter(|b| !b.is_empty() && b != "None"),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServiceStatus {
    Updated { from: String, to: String },
    Unchanged,
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOutcome {
    pub file: PathBuf,
    pub project: String,
    #[serde(flatten)]
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ServicesReport {
    pub outcomes: Vec<ServiceOutcome>,
}

impl ServicesReport {
    #[must_use]
    pub fn updated(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o.status, ServiceStatus::Updated { .. })).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o.status, ServiceStatus::Failed { .. })).count()
    }

    #[must_use]
    pub fn to_table(&self) -> String {
        let mut out = String::new();
        let mut current: Option<&Path> = None;
        for outcome in &self.outcomes {
            if current != Some(outcome.file.as_path()) {
                let _ = writeln!(out, "{}", outcome.file.display().to_string().bold());
                current = Some(outcome.file.as_path());
            }
            let status = match &outcome.status {
                ServiceStatus::Updated {
                    from,
                    to,
                } => format!("{} -> {}", short(from), short(to)).green(),
                ServiceStatus::Unchanged => "up to date".bright_black(),
                ServiceStatus::Skipped {
                    reason,
                } => format!("skipped ({reason})").bright_black(),
                ServiceStatus::Failed {
                    reason,
                } => format!("failed: {reason}").red(),
            };
            let _ = writeln!(out, "  {:<36} {status}", outcome.project);
        }
        let _ = writeln!(
            out,
            "\n{} project(s) updated, {} failed",
            self.updated(),
            self.failed()
        );
        out
    }
}

fn short(value: &str) -> &str {
    value.get(..12).unwrap_or(value)
}

/// Moves service install branches to their track branch heads.
pub struct ServiceBumper<'a, R> {
    resolver: &'a R,
    rewriter: Rewriter,
    /// `(repo, branch)` heads already resolved in this run
    heads: HashMap<(String, String), std::result::Result<String, String>>,
}

impl<'a, R: RefResolver> ServiceBumper<'a, R> {
    pub fn new(resolver: &'a R) -> Self {
        Self {
            resolver,
            rewriter: Rewriter::new(),
            heads: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_rewriter(mut self, rewriter: Rewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    async fn head(&mut self, repo: &str, branch: &str) -> std::result::Result<String, String> {
        let key = (repo.to_string(), branch.to_string());
        if let Some(cached) = self.heads.get(&key) {
            return cached.clone();
        }
        let result = self.resolver.resolve_ref(repo, branch).await.map_err(|e| format!("{e:#}"));
        self.heads.insert(key, result.clone());
        result
    }

    /// Bump every project of every file.
    ///
    /// Heads are resolved and every edited key is checked across all files
    /// before the first write. Files are then written as in
    /// [`Rewriter::apply_all`], so a failing file does not stop the others.
    pub async fn bump(&mut self, files: &[PathBuf]) -> Result<ServicesReport> {
        let mut report = ServicesReport::default();
        let mut plans = Vec::new();
        for path in files {
            let edits = self.plan_file(path, &mut report).await?;
            if !edits.is_empty() {
                plans.push(FileEdits {
                    path: path.clone(),
                    edits,
                });
            }
        }
        if plans.is_empty() {
            return Ok(report);
        }

        let mut targets: Vec<FieldPath> = Vec::new();
        for edit in plans.iter().flat_map(|plan| &plan.edits) {
            if !targets.contains(&edit.target) {
                targets.push(edit.target.clone());
            }
        }
        self.rewriter.check_targets(files, &targets)?;

        let written = self.rewriter.apply_all("service install branches", &plans)?;
        for file in &written.files {
            if let RewriteOutcome::Updated(changes) = &file.outcome {
                info!("Updated {} project(s) in {}", changes.len(), file.path.display());
            }
        }
        Ok(report)
    }

    async fn plan_file(&mut self, path: &Path, report: &mut ServicesReport) -> Result<Vec<Edit>> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let found = projects(&text);
        if found.is_empty() {
            debug!("No projects in {}", path.display());
        }

        let mut edits = Vec::new();
        for project in found {
            let status = self.plan(&project, &mut edits).await;
            report.outcomes.push(ServiceOutcome {
                file: path.to_path_buf(),
                project: project.name,
                status,
            });
        }
        Ok(edits)
    }

    async fn plan(&mut self, project: &ServiceProject, edits: &mut Vec<Edit>) -> ServiceStatus {
        let skipped = |reason: &str| ServiceStatus::Skipped {
            reason: reason.to_string(),
        };
        let Some(branch) = project.track_branch.as_deref() else {
            return skipped("no track branch");
        };
        let Some(current) = project.install_branch.as_deref() else {
            return skipped("no install branch");
        };
        if project.repo.contains("{{") {
            return skipped("templated repository URL");
        }

        match self.head(&project.repo, branch).await {
            Ok(sha) if sha == current => ServiceStatus::Unchanged,
            Ok(sha) => {
                edits.push(
                    Edit::new(FieldPath::key(project.install_key()), sha.clone())
                        .with_head_comment(branch),
                );
                ServiceStatus::Updated {
                    from: current.to_string(),
                    to: sha,
                }
            }
            Err(reason) => {
                warn!("{}: {reason}", project.name);
                ServiceStatus::Failed {
                    reason,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ReleaseError;
    use crate::test_utils::FakeRefResolver;
    use std::fs;
    use tempfile::TempDir;

    const NOVA: &str = "https://opendev.org/openstack/nova";
    const OLD: &str = "0123456789abcdef0123456789abcdef01234567";
    const NEW: &str = "fedcba9876543210fedcba9876543210fedcba98";
    const GLANCE: &str = "https://opendev.org/openstack/glance";

    fn nova_file() -> String {
        format!(
            "---\n\
             ## Nova service\n\
             nova_git_repo: {NOVA}\n\
             nova_git_install_branch: {OLD} # HEAD of \"master\" as of 01.01.2025\n\
             nova_git_track_branch: master\n\
             \n\
             ## Frozen project\n\
             heat_git_repo: https://opendev.org/openstack/heat\n\
             heat_git_install_branch: {OLD}\n\
             heat_git_track_branch: None\n"
        )
    }

    #[test]
    fn test_projects() {
        let found = projects(&nova_file());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "nova");
        assert_eq!(found[0].track_branch.as_deref(), Some("master"));
        assert_eq!(found[1].track_branch, None);
    }

    #[tokio::test]
    async fn test_bump_updates_install_branch_and_comment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("openstack_services.yml");
        fs::write(&path, nova_file()).unwrap();
        let resolver = FakeRefResolver::new().with_ref(NOVA, "master", NEW);

        let report = ServiceBumper::new(&resolver)
            .with_rewriter(Rewriter::with_date("18.10.2026"))
            .bump(std::slice::from_ref(&path))
            .await
            .unwrap();

        assert_eq!(report.updated(), 1);
        assert_eq!(report.outcomes[1].status, ServiceStatus::Skipped {
            reason: "no track branch".to_string()
        });
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(&format!(
            "nova_git_install_branch: {NEW} # HEAD of \"master\" as of 18.10.2026\n"
        )));
        assert!(text.contains(&format!("heat_git_install_branch: {OLD}\n")));
    }

    #[tokio::test]
    async fn test_only_file_with_project_changes() {
        let dir = TempDir::new().unwrap();
        let with_nova = dir.path().join("a.yml");
        let without = dir.path().join("b.yml");
        fs::write(&with_nova, nova_file()).unwrap();
        let other = "---\nkeystone_galera_user: keystone\n";
        fs::write(&without, other).unwrap();
        let resolver = FakeRefResolver::new().with_ref(NOVA, "master", NEW);

        let report =
            ServiceBumper::new(&resolver).bump(&[with_nova.clone(), without.clone()]).await.unwrap();

        assert_eq!(report.updated(), 1);
        assert_eq!(fs::read_to_string(&without).unwrap(), other);
        assert!(fs::read_to_string(&with_nova).unwrap().contains(NEW));
    }

    #[tokio::test]
    async fn test_same_repo_resolved_once() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.yml");
        let b = dir.path().join("b.yml");
        fs::write(&a, nova_file()).unwrap();
        fs::write(&b, nova_file()).unwrap();
        let resolver = FakeRefResolver::new().with_ref(NOVA, "master", NEW);

        let report = ServiceBumper::new(&resolver).bump(&[a, b]).await.unwrap();

        assert_eq!(report.updated(), 2);
        assert_eq!(resolver.resolved().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_leaves_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.yml");
        fs::write(&path, nova_file()).unwrap();
        let resolver = FakeRefResolver::new();

        let report = ServiceBumper::new(&resolver).bump(std::slice::from_ref(&path)).await.unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), nova_file());
        assert!(report.to_table().contains("0 project(s) updated, 1 failed"));
    }

    fn glance_file() -> String {
        format!(
            "glance_git_repo: {GLANCE}\n\
             glance_git_install_branch: {OLD}\n\
             glance_git_track_branch: master\n"
        )
    }

    #[tokio::test]
    async fn test_duplicate_key_in_later_file_stops_before_writing() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.yml");
        let b = dir.path().join("b.yml");
        fs::write(&a, nova_file()).unwrap();
        let duplicated = format!(
            "nova_git_repo: {NOVA}\n\
             nova_git_install_branch: {OLD}\n\
             nova_git_install_branch: {OLD}\n\
             nova_git_track_branch: master\n"
        );
        fs::write(&b, &duplicated).unwrap();
        let resolver = FakeRefResolver::new().with_ref(NOVA, "master", NEW);

        let err = ServiceBumper::new(&resolver).bump(&[a.clone(), b.clone()]).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ReleaseError>(),
            Some(ReleaseError::AmbiguousTarget { .. })
        ));
        assert!(format!("{err:#}").contains("b.yml"));
        assert_eq!(fs::read_to_string(&a).unwrap(), nova_file());
        assert_eq!(fs::read_to_string(&b).unwrap(), duplicated);
    }

    #[tokio::test]
    async fn test_conflicting_install_forms_across_files() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.yml");
        let b = dir.path().join("b.yml");
        fs::write(&a, nova_file()).unwrap();
        let branch = format!(
            "nova_git_repo: {NOVA}\n\
             nova_git_install_branch: stable/2024.1\n\
             nova_git_track_branch: master\n"
        );
        fs::write(&b, &branch).unwrap();
        let resolver = FakeRefResolver::new().with_ref(NOVA, "master", NEW);

        let err = ServiceBumper::new(&resolver).bump(&[a.clone(), b]).await.unwrap_err();

        match err.downcast_ref::<ReleaseError>() {
            Some(ReleaseError::AmbiguousTarget {
                reason,
                ..
            }) => assert!(reason.contains("conflicting forms"), "{reason}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fs::read_to_string(&a).unwrap(), nova_file());
    }

    #[tokio::test]
    async fn test_write_failure_after_success_is_partial() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.yml");
        let b = dir.path().join("b.yml");
        fs::write(&a, nova_file()).unwrap();
        fs::write(&b, glance_file()).unwrap();
        // a directory on the temp path makes the write of b.yml fail for any user
        fs::create_dir(dir.path().join(".b.yml.tmp")).unwrap();
        let resolver = FakeRefResolver::new()
            .with_ref(NOVA, "master", NEW)
            .with_ref(GLANCE, "master", NEW);

        let err = ServiceBumper::new(&resolver).bump(&[a.clone(), b.clone()]).await.unwrap_err();

        match err.downcast_ref::<ReleaseError>() {
            Some(ReleaseError::PartialRewrite {
                succeeded,
                failed,
                ..
            }) => {
                assert_eq!(succeeded, &vec![a.clone()]);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].0, b);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(fs::read_to_string(&a).unwrap().contains(NEW));
        assert_eq!(fs::read_to_string(&b).unwrap(), glance_file());
    }
}
