//! `bump_upstream_shas`: move OpenStack service SHAs to their branch heads.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::CommandContext;
use crate::constants::DEFAULT_SHA_GLOBS;
use crate::core::ReleaseError;
use crate::git::{GitRefResolver, ensure_git_available};
use crate::pattern::ManifestLocator;
use crate::services::ServiceBumper;

#[derive(Args, Debug)]
pub struct BumpUpstreamShasCommand {
    /// Glob expression for files that contain SHAs, searched in addition to
    /// the default service manifests (repeatable)
    #[arg(long = "path", value_name = "GLOB")]
    pub(crate) paths: Vec<String>,
}

impl BumpUpstreamShasCommand {
    /// Default globs followed by every `--path`.
    pub(crate) fn patterns(&self) -> Vec<String> {
        DEFAULT_SHA_GLOBS
            .iter()
            .map(|glob| (*glob).to_string())
            .chain(self.paths.iter().cloned())
            .collect()
    }

    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let patterns = self.patterns();
        let files = ManifestLocator.locate_required(&patterns, &ctx.root)?;
        info!("Bumping upstream SHAs in {} file(s)", files.len());

        ensure_git_available()?;
        let resolver = GitRefResolver::new(ctx.config.git_timeout());
        let report = ServiceBumper::new(&resolver).bump(&files).await?;

        if report.outcomes.is_empty() {
            return Err(ReleaseError::ManifestNotFound {
                patterns,
            }
            .into());
        }

        print!("{}", report.to_table());
        Ok(())
    }
}
