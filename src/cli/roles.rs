//! Role subcommands: `bump_roles`, `freeze_roles_for_milestone` and
//! `unfreeze_roles_from_milestone`.
//!
//! All three read the main role file and, when given, a second file of
//! external roles with identical semantics. Both files are planned before
//! either is written; a write failure in one file is reported together
//! with the files already written.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tracing::{info, warn};

use super::CommandContext;
use crate::constants::DEFAULT_ROLE_FILE;
use crate::git::{GitRefResolver, GitRepo, ensure_git_available};
use crate::releasenotes::GitReleaseNotes;
use crate::roles::{RoleFile, RoleUpdater};

/// Branch on which external roles are bumped.
const EXTERNAL_BUMP_BRANCH: &str = "master";

#[derive(Args, Debug)]
pub struct RoleFileArgs {
    /// Path to the ansible-role-requirements.yml file
    #[arg(long, default_value = DEFAULT_ROLE_FILE)]
    file: PathBuf,

    /// Separate file of roles from external sources
    #[arg(long = "external-file", value_name = "PATH")]
    external_file: Option<PathBuf>,
}

impl RoleFileArgs {
    async fn load(&self, ctx: &CommandContext) -> Result<Vec<RoleFile>> {
        let mut files = vec![RoleFile::load(&ctx.resolve(&self.file)).await?];
        if let Some(external) = &self.external_file {
            files.push(RoleFile::load(&ctx.resolve(external)).await?);
        }
        Ok(files)
    }
}

#[derive(Clone, Copy)]
enum Operation {
    Bump { include_external: bool },
    Freeze,
    Unfreeze,
}

async fn run(ctx: &CommandContext, args: &RoleFileArgs, operation: Operation) -> Result<()> {
    let files = args.load(ctx).await?;
    if !matches!(operation, Operation::Unfreeze) {
        ensure_git_available()?;
    }

    let resolver = GitRefResolver::new(ctx.config.git_timeout());
    let notes = GitReleaseNotes::new(ctx.config.git_timeout());
    let updater = RoleUpdater::new(
        &resolver,
        &notes,
        ctx.config.primary_git_host.clone(),
        ctx.release_notes_dir(),
    );

    let report = match operation {
        Operation::Bump {
            include_external,
        } => updater.bump(&files, include_external).await?,
        Operation::Freeze => updater.freeze(&files).await?,
        Operation::Unfreeze => updater.unfreeze(&files).await?,
    };

    if report.failed() > 0 {
        warn!("{} role(s) could not be updated", report.failed());
    }
    print!("{}", report.to_table());
    Ok(())
}

#[derive(Args, Debug)]
pub struct BumpRolesCommand {
    #[command(flatten)]
    files: RoleFileArgs,

    /// Branch of the openstack-ansible checkout; detected from git when omitted.
    /// External roles are only bumped on master.
    #[arg(long)]
    branch: Option<String>,
}

impl BumpRolesCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let branch = match self.branch {
            Some(branch) => Some(branch),
            None => detect_branch(ctx).await,
        };
        let include_external = branch.as_deref() == Some(EXTERNAL_BUMP_BRANCH);
        info!(
            "Bumping roles on branch {}{}",
            branch.as_deref().unwrap_or("<unknown>"),
            if include_external { ", including external roles" } else { "" }
        );
        run(ctx, &self.files, Operation::Bump {
            include_external,
        })
        .await
    }
}

async fn detect_branch(ctx: &CommandContext) -> Option<String> {
    match GitRepo::new(&ctx.root).current_branch().await {
        Ok(Some(branch)) => Some(branch),
        Ok(None) => {
            warn!("Detached HEAD in {}, treating it as not master", ctx.root.display());
            None
        }
        Err(e) => {
            warn!("Cannot detect branch of {}: {e:#}", ctx.root.display());
            None
        }
    }
}

#[derive(Args, Debug)]
pub struct FreezeRolesCommand {
    #[command(flatten)]
    files: RoleFileArgs,
}

impl FreezeRolesCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        run(ctx, &self.files, Operation::Freeze).await
    }
}

#[derive(Args, Debug)]
pub struct UnfreezeRolesCommand {
    #[command(flatten)]
    files: RoleFileArgs,
}

impl UnfreezeRolesCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        run(ctx, &self.files, Operation::Unfreeze).await
    }
}
