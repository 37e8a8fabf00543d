//! Raw files of the requirements repository served by opendev.

use anyhow::Result;

use super::{FileFetcher, get_text, http_client};
use crate::config::ReleaseConfig;

/// Production [`FileFetcher`]: `GET {requirements_raw_url}/{reference}/{path}`.
#[derive(Debug, Clone)]
pub struct OpenDevFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl OpenDevFetcher {
    pub fn new(config: &ReleaseConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.requirements_raw_url.trim_end_matches('/').to_string(),
        })
    }

    fn file_url(&self, reference: &str, path: &str) -> String {
        format!("{}/{reference}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl FileFetcher for OpenDevFetcher {
    async fn fetch_file(&self, reference: &str, path: &str) -> Result<String> {
        let url = self.file_url(reference, path);
        tracing::debug!("Fetching {url}");
        get_text(&self.client, &url).await
    }
}
