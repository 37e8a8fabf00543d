//! Ansible Galaxy v3 collection index.

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{CollectionIndex, get_text, http_client};
use crate::config::ReleaseConfig;

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    highest_version: HighestVersion,
}

#[derive(Debug, Deserialize)]
struct HighestVersion {
    version: String,
}

/// Production [`CollectionIndex`] reading `highest_version` from Galaxy.
#[derive(Debug, Clone)]
pub struct GalaxyIndex {
    client: reqwest::Client,
    base_url: String,
}

impl GalaxyIndex {
    pub fn new(config: &ReleaseConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.galaxy_url.trim_end_matches('/').to_string(),
        })
    }

    /// Index URL for `namespace.name`.
    fn collection_url(&self, fqcn: &str) -> Result<String> {
        let (namespace, name) = fqcn
            .split_once('.')
            .with_context(|| format!("'{fqcn}' is not a namespace.name collection"))?;
        Ok(format!(
            "{}/api/v3/plugin/ansible/content/published/collections/index/{namespace}/{name}/",
            self.base_url
        ))
    }
}

impl CollectionIndex for GalaxyIndex {
    async fn latest_collection(&self, fqcn: &str) -> Result<String> {
        let body = get_text(&self.client, &self.collection_url(fqcn)?).await?;
        let response: CollectionResponse = serde_json::from_str(&body)
            .with_context(|| format!("Unexpected Galaxy response for {fqcn}"))?;
        Ok(response.highest_version.version)
    }
}
