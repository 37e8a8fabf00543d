//! `check_pins`: compare global requirement pins with PyPI and upper constraints.
//!
//! Read-only. The upper-constraints reference comes from
//! `--requirements_sha` or, failing that, from a constraints URL mentioned in
//! the pin file itself.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use super::CommandContext;
use crate::constants::DEFAULT_PIN_FILE;
use crate::constraints::{ConstraintFetcher, select_reference};
use crate::report::PinReport;
use crate::requirements::{ParseMode, RequirementsFile};
use crate::upstream::{FileFetcher, OpenDevFetcher, PackageIndex, PypiIndex, VersionResolver};

/// Report rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct CheckPinsCommand {
    /// Requirements SHA used to fetch the upper constraints file
    #[arg(long = "requirements_sha", alias = "requirements-sha", value_name = "REF")]
    pub(crate) requirements_sha: Option<String>,

    /// Path to the global requirements pin file
    #[arg(long, default_value = DEFAULT_PIN_FILE)]
    pub(crate) file: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) format: OutputFormat,

    /// Fail on malformed pin lines instead of skipping them
    #[arg(long)]
    pub(crate) strict: bool,
}

impl CheckPinsCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let path = ctx.resolve(&self.file);
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read pin file: {}", path.display()))?;
        let mode = if self.strict { ParseMode::Strict } else { ParseMode::Lenient };
        let pins = RequirementsFile::parse(&text, &path.display().to_string(), mode)?;

        let reference =
            select_reference(self.requirements_sha.as_deref(), &text, &path.display().to_string())?;
        info!("Checking {} pin(s) against requirements at {reference}", pins.pins().len());

        let report = build_report(
            &pins,
            &reference,
            PypiIndex::new(&ctx.config)?,
            OpenDevFetcher::new(&ctx.config)?,
            ctx,
        )
        .await?;

        match self.format {
            OutputFormat::Table => print!("{}", report.to_table()),
            OutputFormat::Json => println!("{}", report.to_json()?),
        }
        Ok(())
    }
}

/// Resolve latest versions, fetch constraints and assemble the report.
pub(crate) async fn build_report<I, F>(
    pins: &RequirementsFile,
    reference: &str,
    index: I,
    fetcher: F,
    ctx: &CommandContext,
) -> Result<PinReport>
where
    I: PackageIndex,
    F: FileFetcher,
{
    let constraints = ConstraintFetcher::new(fetcher, ctx.config.constraints_file.clone())
        .fetch(reference)
        .await?;
    let latest = VersionResolver::new(index, &ctx.config).resolve(pins.names()).await;
    Ok(PinReport::build(pins.pins(), &latest, &constraints))
}
