//! Role requirement bumping and the milestone freeze/unfreeze cycle.
//!
//! A role in `ansible-role-requirements.yml` either *tracks* a branch
//! (`version: master`) or is *frozen* at a commit (`version: <40-hex sha>`).
//! Its `trackbranch` field names the branch it follows and is never changed
//! by this module, which is what lets unfreeze restore the exact tracking
//! value after a freeze.
//!
//! ```yaml
//! - name: os_nova
//!   scm: git
//!   src: https://opendev.org/openstack/openstack-ansible-os_nova
//!   version: master
//!   trackbranch: master
//! ```
//!
//! Roles without a `trackbranch` (or with `trackbranch: None`) are pinned on
//! purpose and skipped by every operation.
//!
//! Every operation takes the main role file and, optionally, a file of
//! external roles. Edits are planned for all files first, then each file gets
//! a single atomic write through [`Rewriter::apply_all`], so only the
//! `version` values change on disk.

mod file;

pub use file::{RoleFile, RoleRequirement};

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::fmt::{self, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::git::RefResolver;
use crate::manifest::{Edit, FieldPath, FileEdits, RewriteOutcome, Rewriter, is_sha};
use crate::releasenotes::ReleaseNotesSource;

/// Whether a role follows a branch or sits on a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreezeState {
    /// `version` is a branch or tag name
    Tracking(String),
    /// `version` is a full commit SHA
    Frozen(String),
}

impl FreezeState {
    #[must_use]
    pub fn of(version: &str) -> Self {
        if is_sha(version) {
            Self::Frozen(version.to_string())
        } else {
            Self::Tracking(version.to_string())
        }
    }

    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        matches!(self, Self::Frozen(_))
    }
}

/// Why nothing was done for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    AlreadyFrozen,
    AlreadyTracking,
    UpToDate,
}

/// Why a role was left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No `trackbranch`, or `trackbranch: None`
    Pinned,
    /// `scm` is set to something other than git
    NotGit,
    /// External role while the integrated repository is not on master
    ExternalOffMaster,
}

/// What happened to one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RoleAction {
    Frozen { sha: String },
    Unfrozen { branch: String },
    Bumped { from: String, to: String },
    NoOp { reason: NoOpReason },
    Skipped { reason: SkipReason },
    Failed { reason: String },
}

impl fmt::Display for RoleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frozen {
                sha,
            } => write!(f, "frozen at {sha}"),
            Self::Unfrozen {
                branch,
            } => write!(f, "tracking {branch}"),
            Self::Bumped {
                from,
                to,
            } => write!(f, "{from} -> {to}"),
            Self::NoOp {
                reason,
            } => match reason {
                NoOpReason::AlreadyFrozen => f.write_str("already frozen"),
                NoOpReason::AlreadyTracking => f.write_str("already tracking"),
                NoOpReason::UpToDate => f.write_str("up to date"),
            },
            Self::Skipped {
                reason,
            } => match reason {
                SkipReason::Pinned => f.write_str("skipped (no trackbranch)"),
                SkipReason::NotGit => f.write_str("skipped (not a git role)"),
                SkipReason::ExternalOffMaster => f.write_str("skipped (external, not on master)"),
            },
            Self::Failed {
                reason,
            } => write!(f, "failed: {reason}"),
        }
    }
}

/// Outcome for one role entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleOutcome {
    pub name: String,
    pub file: PathBuf,
    #[serde(flatten)]
    pub action: RoleAction,
    /// Release notes copied for this role
    pub notes_copied: usize,
}

/// Outcomes of one run over one or more role files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RolesReport {
    pub outcomes: Vec<RoleOutcome>,
}

impl RolesReport {
    /// Roles whose `version` was written.
    #[must_use]
    pub fn changed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o.action,
                    RoleAction::Frozen { .. } | RoleAction::Unfrozen { .. } | RoleAction::Bumped { .. }
                )
            })
            .count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o.action, RoleAction::Failed { .. })).count()
    }

    #[must_use]
    pub fn to_table(&self) -> String {
        let mut out = String::new();
        for outcome in &self.outcomes {
            let action = match outcome.action {
                RoleAction::Failed { .. } => outcome.action.to_string().red(),
                RoleAction::NoOp { .. } | RoleAction::Skipped { .. } => {
                    outcome.action.to_string().bright_black()
                }
                _ => outcome.action.to_string().green(),
            };
            let _ = write!(out, "{:<40} {action}", outcome.name);
            if outcome.notes_copied > 0 {
                let _ = write!(out, " ({} release note(s))", outcome.notes_copied);
            }
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "\n{} role(s) changed, {} failed, {} total",
            self.changed(),
            self.failed(),
            self.outcomes.len()
        );
        out
    }
}

/// Applies bump, freeze and unfreeze to role files.
pub struct RoleUpdater<'a, R, N> {
    resolver: &'a R,
    notes: &'a N,
    rewriter: Rewriter,
    primary_host: String,
    notes_dir: PathBuf,
}

/// A role accepted for processing.
struct Candidate<'r> {
    role: &'r RoleRequirement,
    src: &'r str,
    branch: &'r str,
    version: &'r str,
}

impl<'a, R: RefResolver, N: ReleaseNotesSource> RoleUpdater<'a, R, N> {
    /// `primary_host` decides which roles get release notes copied into `notes_dir`.
    pub fn new(
        resolver: &'a R,
        notes: &'a N,
        primary_host: impl Into<String>,
        notes_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            resolver,
            notes,
            rewriter: Rewriter::new(),
            primary_host: primary_host.into(),
            notes_dir: notes_dir.into(),
        }
    }

    #[must_use]
    pub fn with_rewriter(mut self, rewriter: Rewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    fn is_primary(&self, role: &RoleRequirement) -> bool {
        role.src.as_deref().is_some_and(|src| src.contains(&self.primary_host))
    }

    /// Sort a role into a candidate or a terminal action.
    fn screen<'r>(role: &'r RoleRequirement) -> Result<Candidate<'r>, RoleAction> {
        if role.scm.as_deref().is_some_and(|scm| scm != "git") {
            return Err(RoleAction::Skipped {
                reason: SkipReason::NotGit,
            });
        }
        let Some(branch) = role.tracking_branch() else {
            return Err(RoleAction::Skipped {
                reason: SkipReason::Pinned,
            });
        };
        let Some(src) = role.src.as_deref() else {
            return Err(RoleAction::Failed {
                reason: "no src".to_string(),
            });
        };
        let Some(version) = role.version.as_deref() else {
            return Err(RoleAction::Failed {
                reason: "no version field".to_string(),
            });
        };
        Ok(Candidate {
            role,
            src,
            branch,
            version,
        })
    }

    /// Freeze every tracking role at the current head of its `trackbranch`.
    pub async fn freeze(&self, files: &[RoleFile]) -> Result<RolesReport> {
        let mut plans = Vec::with_capacity(files.len());
        for file in files {
            plans.push(self.plan_freeze(file).await);
        }
        self.execute(files, plans).await
    }

    async fn plan_freeze(&self, file: &RoleFile) -> Plan {
        let mut plan = Plan::default();
        for role in file.roles() {
            let candidate = match Self::screen(role) {
                Ok(candidate) => candidate,
                Err(action) => {
                    plan.done(role, action);
                    continue;
                }
            };
            if FreezeState::of(candidate.version).is_frozen() {
                plan.done(role, RoleAction::NoOp {
                    reason: NoOpReason::AlreadyFrozen,
                });
                continue;
            }
            match self.resolver.resolve_ref(candidate.src, candidate.branch).await {
                Ok(sha) => {
                    let notes = self.is_primary(role);
                    plan.write(&candidate, sha.clone(), RoleAction::Frozen { sha }, notes);
                }
                Err(e) => plan.failed(role, &e),
            }
        }
        plan
    }

    /// Point every frozen role back at its `trackbranch`.
    pub async fn unfreeze(&self, files: &[RoleFile]) -> Result<RolesReport> {
        let plans = files.iter().map(Self::plan_unfreeze).collect();
        self.execute(files, plans).await
    }

    fn plan_unfreeze(file: &RoleFile) -> Plan {
        let mut plan = Plan::default();
        for role in file.roles() {
            let candidate = match Self::screen(role) {
                Ok(candidate) => candidate,
                Err(action) => {
                    plan.done(role, action);
                    continue;
                }
            };
            if FreezeState::of(candidate.version).is_frozen() {
                let branch = candidate.branch.to_string();
                plan.write(&candidate, branch.clone(), RoleAction::Unfrozen { branch }, false);
            } else {
                plan.done(role, RoleAction::NoOp {
                    reason: NoOpReason::AlreadyTracking,
                });
            }
        }
        plan
    }

    /// Move every role to the head of its `trackbranch`, frozen or not.
    ///
    /// External roles are only bumped when `include_external` is set.
    pub async fn bump(&self, files: &[RoleFile], include_external: bool) -> Result<RolesReport> {
        let mut plans = Vec::with_capacity(files.len());
        for file in files {
            plans.push(self.plan_bump(file, include_external).await);
        }
        self.execute(files, plans).await
    }

    async fn plan_bump(&self, file: &RoleFile, include_external: bool) -> Plan {
        let mut plan = Plan::default();
        for role in file.roles() {
            let candidate = match Self::screen(role) {
                Ok(candidate) => candidate,
                Err(action) => {
                    plan.done(role, action);
                    continue;
                }
            };
            let primary = self.is_primary(role);
            if !primary && !include_external {
                plan.done(role, RoleAction::Skipped {
                    reason: SkipReason::ExternalOffMaster,
                });
                continue;
            }
            match self.resolver.resolve_ref(candidate.src, candidate.branch).await {
                Ok(sha) if sha == candidate.version => plan.done(role, RoleAction::NoOp {
                    reason: NoOpReason::UpToDate,
                }),
                Ok(sha) => {
                    let action = RoleAction::Bumped {
                        from: candidate.version.to_string(),
                        to: sha.clone(),
                    };
                    plan.write(&candidate, sha, action, primary);
                }
                Err(e) => plan.failed(role, &e),
            }
        }
        plan
    }

    /// Write the planned edits of every file, then copy release notes for
    /// written roles.
    ///
    /// Edited roles are checked across all files before the first write.
    /// Files are written as in [`Rewriter::apply_all`]: a failing file does
    /// not stop the others and nothing is rolled back.
    async fn execute(&self, files: &[RoleFile], mut plans: Vec<Plan>) -> Result<RolesReport> {
        let writes: Vec<FileEdits> = files
            .iter()
            .zip(plans.iter_mut())
            .filter(|(_, plan)| !plan.edits.is_empty())
            .map(|(file, plan)| FileEdits {
                path: file.path().to_path_buf(),
                edits: std::mem::take(&mut plan.edits),
            })
            .collect();

        if !writes.is_empty() {
            let mut targets: Vec<FieldPath> = Vec::new();
            for edit in writes.iter().flat_map(|w| &w.edits) {
                if !targets.contains(&edit.target) {
                    targets.push(edit.target.clone());
                }
            }
            let paths: Vec<PathBuf> = files.iter().map(|f| f.path().to_path_buf()).collect();
            self.rewriter.check_targets(&paths, &targets)?;

            let written = self.rewriter.apply_all("role versions", &writes)?;
            for file in &written.files {
                if let RewriteOutcome::Updated(changes) = &file.outcome {
                    info!("Updated {} role(s) in {}", changes.len(), file.path.display());
                }
            }
        }

        let mut report = RolesReport::default();
        for (file, plan) in files.iter().zip(plans) {
            let Plan {
                mut outcomes,
                notes,
                ..
            } = plan;
            for pending in notes {
                let copied = self.copy_notes(&pending).await;
                if let Some(outcome) = outcomes.get_mut(pending.index) {
                    outcome.2 = copied;
                }
            }
            report.outcomes.extend(outcomes.into_iter().map(|(name, action, notes_copied)| {
                RoleOutcome {
                    name,
                    file: file.path().to_path_buf(),
                    action,
                    notes_copied,
                }
            }));
        }
        Ok(report)
    }

    async fn copy_notes(&self, pending: &PendingNotes) -> usize {
        match self.notes.copy_notes(&pending.src, &pending.branch, &pending.sha, &self.notes_dir).await
        {
            Ok(copied) => {
                debug!("{}: copied {} release note(s)", pending.name, copied.len());
                copied.len()
            }
            Err(e) => {
                warn!("{}: could not copy release notes: {e:#}", pending.name);
                0
            }
        }
    }
}

struct PendingNotes {
    index: usize,
    name: String,
    src: String,
    branch: String,
    sha: String,
}

/// Actions decided for one file before anything is written.
#[derive(Default)]
struct Plan {
    outcomes: Vec<(String, RoleAction, usize)>,
    edits: Vec<Edit>,
    notes: Vec<PendingNotes>,
}

impl Plan {
    fn done(&mut self, role: &RoleRequirement, action: RoleAction) {
        debug!("{}: {action}", role.name);
        self.outcomes.push((role.name.clone(), action, 0));
    }

    fn failed(&mut self, role: &RoleRequirement, error: &anyhow::Error) {
        warn!("{}: {error:#}", role.name);
        self.outcomes.push((
            role.name.clone(),
            RoleAction::Failed {
                reason: format!("{error:#}"),
            },
            0,
        ));
    }

    fn write(&mut self, candidate: &Candidate<'_>, value: String, action: RoleAction, notes: bool) {
        if notes {
            self.notes.push(PendingNotes {
                index: self.outcomes.len(),
                name: candidate.role.name.clone(),
                src: candidate.src.to_string(),
                branch: candidate.branch.to_string(),
                sha: value.clone(),
            });
        }
        self.edits.push(Edit::new(FieldPath::item(&candidate.role.name, "version"), value));
        self.outcomes.push((candidate.role.name.clone(), action, 0));
    }
}
