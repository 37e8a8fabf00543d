//! `bump_collections`: move Ansible collections to their latest releases.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::CommandContext;
use crate::collections::{CollectionBumper, CollectionFile};
use crate::constants::DEFAULT_COLLECTION_FILE;
use crate::git::GitRefResolver;
use crate::upstream::GalaxyIndex;

#[derive(Args, Debug)]
pub struct BumpCollectionsCommand {
    /// Path to the ansible-collection-requirements.yml file
    #[arg(long, default_value = DEFAULT_COLLECTION_FILE)]
    file: PathBuf,
}

impl BumpCollectionsCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let file = CollectionFile::load(&ctx.resolve(&self.file)).await?;
        let galaxy = GalaxyIndex::new(&ctx.config)?;
        let resolver = GitRefResolver::new(ctx.config.git_timeout());

        let report = CollectionBumper::new(&galaxy, &resolver).bump(&file).await?;
        print!("{}", report.to_table());
        Ok(())
    }
}
