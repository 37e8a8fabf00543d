//! PyPI JSON API (`GET {pypi_url}/pypi/{name}/json`).

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{PackageIndex, get_text, http_client};
use crate::config::ReleaseConfig;

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    info: ProjectInfo,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    version: String,
}

/// Production [`PackageIndex`] backed by the PyPI JSON API.
#[derive(Debug, Clone)]
pub struct PypiIndex {
    client: reqwest::Client,
    base_url: String,
}

impl PypiIndex {
    pub fn new(config: &ReleaseConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.pypi_url.trim_end_matches('/').to_string(),
        })
    }

    fn project_url(&self, name: &str) -> String {
        format!("{}/pypi/{name}/json", self.base_url)
    }
}

/// Extract `info.version` from a project document.
fn latest_from_body(name: &str, body: &str) -> Result<String> {
    let response: ProjectResponse = serde_json::from_str(body)
        .with_context(|| format!("Unexpected PyPI response for {name}"))?;
    Ok(response.info.version)
}

impl PackageIndex for PypiIndex {
    async fn resolve_latest(&self, name: &str) -> Result<String> {
        let body = get_text(&self.client, &self.project_url(name)).await?;
        latest_from_body(name, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_url_strips_trailing_slash() {
        let config = ReleaseConfig {
            pypi_url: "https://pypi.example.org/".to_string(),
            ..ReleaseConfig::default()
        };
        let index = PypiIndex::new(&config).unwrap();
        assert_eq!(index.project_url("requests"), "https://pypi.example.org/pypi/requests/json");
    }

    #[test]
    fn test_latest_from_body() {
        let body = r#"{"info": {"name": "requests", "version": "2.31.0"}, "releases": {}}"#;
        assert_eq!(latest_from_body("requests", body).unwrap(), "2.31.0");
        assert!(latest_from_body("requests", "<html>").is_err());
    }
}
