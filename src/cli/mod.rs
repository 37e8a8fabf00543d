//! Command-line interface for osa-releases.
//!
//! Each subcommand lives in its own module as a [`clap::Args`] struct with an
//! `execute` method taking the shared [`CommandContext`]. Subcommand names use
//! underscores (`check_pins`, `bump_roles`, ...) to match the names release
//! managers already script against.
//!
//! # Global flags
//!
//! - `-v/--verbose`: debug logging
//! - `-q/--quiet`: warnings and errors only
//! - `--config <PATH>`: TOML overrides for endpoints, timeouts and batching
//! - `--root <DIR>`: integrated repository checkout; relative paths and globs
//!   are resolved against it (default: current directory)
//!
//! Logs go to stderr. Reports go to stdout so they can be piped.

mod bump_collections;
mod bump_upstream_shas;
mod check_pins;
mod roles;


use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::config::ReleaseConfig;

pub use check_pins::OutputFormat;

/// Release tooling for OpenStack-Ansible.
#[derive(Parser, Debug)]
#[command(
    name = "osa-releases",
    about = "Release tooling for OpenStack-Ansible",
    version,
    long_about = "Checks global requirement pins against PyPI and upper constraints, bumps \
                  upstream service SHAs, role and collection versions, and freezes or \
                  unfreezes roles around milestone releases."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root of the openstack-ansible checkout
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare global requirement pins with PyPI and upper constraints
    #[command(name = "check_pins")]
    CheckPins(check_pins::CheckPinsCommand),

    /// Bump SHAs of OpenStack services
    #[command(name = "bump_upstream_shas")]
    BumpUpstreamShas(bump_upstream_shas::BumpUpstreamShasCommand),

    /// Bump versions of Ansible collections
    #[command(name = "bump_collections")]
    BumpCollections(bump_collections::BumpCollectionsCommand),

    /// Bump role SHAs and copy release notes from OpenStack roles
    #[command(name = "bump_roles")]
    BumpRoles(roles::BumpRolesCommand),

    /// Freeze all role SHAs for a milestone release and copy release notes
    #[command(name = "freeze_roles_for_milestone")]
    FreezeRoles(roles::FreezeRolesCommand),

    /// Point frozen roles back at their tracking branches after a milestone
    #[command(name = "unfreeze_roles_from_milestone")]
    UnfreezeRoles(roles::UnfreezeRolesCommand),
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: ReleaseConfig,
    pub root: PathBuf,
}

impl CommandContext {
    /// `path` relative to the root, absolute paths unchanged.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Directory receiving copied release notes.
    #[must_use]
    pub fn release_notes_dir(&self) -> PathBuf {
        self.root.join(&self.config.release_notes_dir)
    }
}

impl Cli {
    /// Tracing filter directive for the verbosity flags.
    #[must_use]
    pub const fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Log filter for `main`: `RUST_LOG` applies unless `-v` or `-q` was given.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        if self.verbose || self.quiet {
            return EnvFilter::new(self.log_filter());
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.log_filter()))
    }

    pub async fn execute(self) -> Result<()> {
        let config = ReleaseConfig::load_with_optional(self.config.as_deref()).await?;
        let ctx = CommandContext {
            config,
            root: self.root,
        };

        match self.command {
            Commands::CheckPins(cmd) => cmd.execute(&ctx).await,
            Commands::BumpUpstreamShas(cmd) => cmd.execute(&ctx).await,
            Commands::BumpCollections(cmd) => cmd.execute(&ctx).await,
            Commands::BumpRoles(cmd) => cmd.execute(&ctx).await,
            Commands::FreezeRoles(cmd) => cmd.execute(&ctx).await,
            Commands::UnfreezeRoles(cmd) => cmd.execute(&ctx).await,
        }
    }
}
