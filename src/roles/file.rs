use anyhow::{Context, Result};
use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

use crate::core::ReleaseError;

/// One entry of a role requirements file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequirement {
    pub name: String,
    #[serde(default)]
    pub scm: Option<String>,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub trackbranch: Option<String>,
}

impl RoleRequirement {
    /// The branch this role follows; `None` for deliberately pinned roles.
    #[must_use]
    pub fn tracking_branch(&self) -> Option<&str> {
        self.trackbranch.as_deref().map(str::trim).filter(|b| !b.is_empty() && *b != "None")
    }
}

/// YAML scalars of any type as their string form, so `version: 1.0` stays usable.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected a scalar, found {other:?}"))),
    }
}

/// A parsed `ansible-role-requirements.yml`.
#[derive(Debug, Clone)]
pub struct RoleFile {
    path: PathBuf,
    roles: Vec<RoleRequirement>,
}

impl RoleFile {
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read role file: {}", path.display()))?;
        Self::parse(&text, path)
    }

    /// Parse `text` as the contents of `path`.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let roles = if text.trim().trim_start_matches("---").trim().is_empty() {
            Vec::new()
        } else {
            serde_yaml::from_str::<Option<Vec<RoleRequirement>>>(text)
                .map_err(|e| ReleaseError::ManifestParseError {
                    file: path.display().to_string(),
                    reason: e.to_string(),
                })?
                .unwrap_or_default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            roles,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn roles(&self) -> &[RoleRequirement] {
        &self.roles
    }
}
