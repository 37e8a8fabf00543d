//! Upper-constraints retrieval.
//!
//! The requirements repository publishes `upper-constraints.txt`, the set of
//! versions OpenStack is tested against. [`ConstraintFetcher`] downloads it at
//! a given reference and parses it with the lenient requirements parser.
//! [`select_reference`] decides which reference to use: the one given on the
//! command line, or the one the pin file itself points at.

use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::info;

use crate::core::ReleaseError;
use crate::requirements::{ParseMode, RequirementsFile, discover_constraints_ref, normalize_name};
use crate::upstream::FileFetcher;

/// Upper-constraints pins, keyed by normalized name.
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    reference: String,
    versions: HashMap<String, String>,
}

impl Constraints {
    /// Constraints from `(name, version)` pairs.
    pub fn new<N, V>(reference: &str, versions: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: AsRef<str>,
        V: Into<String>,
    {
        Self {
            reference: reference.to_string(),
            versions: versions
                .into_iter()
                .map(|(name, version)| (normalize_name(name.as_ref()), version.into()))
                .collect(),
        }
    }

    /// Reference the constraints were fetched at.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// The constrained version of `name`, if the file lists an exact one.
    #[must_use]
    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.versions.get(&normalize_name(name)).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    fn from_file(reference: &str, file: &RequirementsFile) -> Self {
        Self::new(
            reference,
            file.pins()
                .iter()
                .filter_map(|pin| pin.specifiers.exact_version().map(|v| (&pin.name, v))),
        )
    }
}

/// Downloads and parses upper constraints through a [`FileFetcher`].
pub struct ConstraintFetcher<F> {
    fetcher: F,
    path: String,
}

impl<F: FileFetcher> ConstraintFetcher<F> {
    /// `path` is the constraints file name inside the requirements repository.
    pub fn new(fetcher: F, path: impl Into<String>) -> Self {
        Self {
            fetcher,
            path: path.into(),
        }
    }

    /// Fetch the constraints at `reference`.
    pub async fn fetch(&self, reference: &str) -> Result<Constraints> {
        let text = self
            .fetcher
            .fetch_file(reference, &self.path)
            .await
            .with_context(|| format!("Failed to fetch {} at {reference}", self.path))?;
        let file = RequirementsFile::parse(
            &text,
            &format!("{}@{reference}", self.path),
            ParseMode::Lenient,
        )?;
        let constraints = Constraints::from_file(reference, &file);
        info!("Loaded {} upper constraint(s) at {reference}", constraints.len());
        Ok(constraints)
    }
}

/// Pick the requirements reference: an explicit one wins, otherwise it is
/// discovered from the pin file text.
pub fn select_reference(explicit: Option<&str>, pin_text: &str, pin_file: &str) -> Result<String> {
    if let Some(reference) = explicit.map(str::trim).filter(|r| !r.is_empty()) {
        return Ok(reference.to_string());
    }
    discover_constraints_ref(pin_text).ok_or_else(|| {
        ReleaseError::ReferenceDiscovery {
            file: pin_file.to_string(),
        }
        .into()
    })
}
