//! Bumping `ansible-collection-requirements.yml`.
//!
//! ```yaml
//! collections:
//!   - name: ansible.netcommon
//!     source: https://galaxy.ansible.com
//!     version: 5.1.0
//!   - name: openstack.config_template
//!     type: git
//!     source: https://opendev.org/openstack/ansible-config_template#/
//!     version: 2.1.1
//! ```
//!
//! Galaxy collections take Galaxy's `highest_version`. Git collections take
//! the highest stable semver tag of their `source` repository; the tag is
//! written as published, so a `v` prefix survives. A collection whose lookup
//! fails is reported and left alone.

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::ReleaseError;
use crate::git::{RefResolver, highest_semver_tag};
use crate::manifest::{Edit, FieldPath, RewriteOutcome, Rewriter};
use crate::upstream::CollectionIndex;

/// Key of the sequence holding the collections.
pub const COLLECTIONS_KEY: &str = "collections";

/// One entry of the collections list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRequirement {
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl CollectionRequirement {
    #[must_use]
    pub fn is_git(&self) -> bool {
        self.kind.as_deref() == Some("git")
    }

    /// Repository URL of a git collection, without the `#/path` suffix.
    #[must_use]
    pub fn git_url(&self) -> Option<&str> {
        let source = self.source.as_deref().unwrap_or(&self.name);
        let url = source.split_once('#').map_or(source, |(url, _)| url);
        (!url.is_empty()).then_some(url)
    }
}

#[derive(Debug, Deserialize)]
struct CollectionsDocument {
    #[serde(default)]
    collections: Vec<CollectionRequirement>,
}

/// A parsed collections file.
#[derive(Debug, Clone)]
pub struct CollectionFile {
    path: PathBuf,
    collections: Vec<CollectionRequirement>,
}

impl CollectionFile {
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read collection file: {}", path.display()))?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let document: CollectionsDocument =
            serde_yaml::from_str(text).map_err(|e| ReleaseError::ManifestParseError {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            collections: document.collections,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn collections(&self) -> &[CollectionRequirement] {
        &self.collections
    }
}

/// What happened to one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CollectionStatus {
    Updated { from: String, to: String },
    Unchanged { version: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: CollectionStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionsReport {
    pub outcomes: Vec<CollectionOutcome>,
}

impl CollectionsReport {
    #[must_use]
    pub fn count(&self, pred: impl Fn(&CollectionStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    #[must_use]
    pub fn to_table(&self) -> String {
        let mut out = String::new();
        for outcome in &self.outcomes {
            let status = match &outcome.status {
                CollectionStatus::Updated {
                    from,
                    to,
                } => format!("{from} -> {to}").green(),
                CollectionStatus::Unchanged {
                    version,
                } => format!("{version} (latest)").bright_black(),
                CollectionStatus::Failed {
                    reason,
                } => format!("failed: {reason}").red(),
            };
            let _ = writeln!(out, "{:<40} {status}", outcome.name);
        }
        let updated = self.count(|s| matches!(s, CollectionStatus::Updated { .. }));
        let failed = self.count(|s| matches!(s, CollectionStatus::Failed { .. }));
        let _ = writeln!(out, "\n{updated} collection(s) updated, {failed} failed");
        out
    }
}

/// Resolves and writes collection versions.
pub struct CollectionBumper<'a, C, R> {
    galaxy: &'a C,
    resolver: &'a R,
    rewriter: Rewriter,
}

impl<'a, C: CollectionIndex, R: RefResolver> CollectionBumper<'a, C, R> {
    pub fn new(galaxy: &'a C, resolver: &'a R) -> Self {
        Self {
            galaxy,
            resolver,
            rewriter: Rewriter::new(),
        }
    }

    async fn latest(&self, collection: &CollectionRequirement) -> Result<String> {
        if collection.is_git() {
            let url = collection
                .git_url()
                .ok_or_else(|| anyhow!("git collection without a source"))?;
            let tags = self.resolver.list_tags(url).await?;
            highest_semver_tag(tags.iter().map(String::as_str))
                .ok_or_else(|| anyhow!("no release tag found in {url}"))
        } else {
            self.galaxy.latest_collection(&collection.name).await
        }
    }

    /// Bring every collection in `file` to its latest release.
    pub async fn bump(&self, file: &CollectionFile) -> Result<CollectionsReport> {
        let mut report = CollectionsReport::default();
        let mut edits = Vec::new();

        for collection in file.collections() {
            let Some(current) = collection.version.as_deref() else {
                debug!("{} has no version, leaving it alone", collection.name);
                continue;
            };
            let status = match self.latest(collection).await {
                Ok(latest) if latest == current => CollectionStatus::Unchanged {
                    version: latest,
                },
                Ok(latest) => {
                    edits.push(Edit::new(
                        FieldPath::list_item(COLLECTIONS_KEY, &collection.name, "version"),
                        latest.clone(),
                    ));
                    CollectionStatus::Updated {
                        from: current.to_string(),
                        to: latest,
                    }
                }
                Err(e) => {
                    warn!(
                        "{}",
                        ReleaseError::ResolutionError {
                            name: collection.name.clone(),
                            reason: format!("{e:#}"),
                        }
                    );
                    CollectionStatus::Failed {
                        reason: format!("{e:#}"),
                    }
                }
            };
            report.outcomes.push(CollectionOutcome {
                name: collection.name.clone(),
                status,
            });
        }

        if !edits.is_empty() {
            if let RewriteOutcome::Updated(changes) = self.rewriter.apply_file(file.path(), &edits)? {
                info!("Updated {} collection(s) in {}", changes.len(), file.path().display());
            }
        }
        Ok(report)
    }
}
