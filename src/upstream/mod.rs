//! Latest-version lookups against upstream indexes.
//!
//! Three seams isolate the network:
//!
//! - [`PackageIndex`]: latest release of a Python package ([`PypiIndex`])
//! - [`CollectionIndex`]: latest release of an Ansible collection ([`GalaxyIndex`])
//! - [`FileFetcher`]: a raw file of the requirements repository at a ref ([`OpenDevFetcher`])
//!
//! [`VersionResolver`] drives a [`PackageIndex`] over a set of names. Lookups
//! run one after another in batches with a pause in between, every lookup is
//! retried with exponential backoff, and whatever still fails is recorded as
//! [`LookupResult::Unknown`] instead of aborting the run. Results are memoized
//! in a [`LookupCache`] owned by the resolver, so a name is only ever fetched
//! once per invocation.

mod galaxy;
mod opendev;
mod pypi;

pub use galaxy::GalaxyIndex;
pub use opendev::OpenDevFetcher;
pub use pypi::PypiIndex;

use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, info, warn};

use crate::config::ReleaseConfig;
use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use crate::core::ReleaseError;
use crate::requirements::normalize_name;

/// Source of the latest released version of a Python package.
pub trait PackageIndex {
    /// Latest version string of `name` as published by the index.
    fn resolve_latest(&self, name: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Source of the latest released version of an Ansible collection.
pub trait CollectionIndex {
    /// Latest version of `namespace.name`.
    fn latest_collection(&self, fqcn: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Fetches a file of the requirements repository at a given reference.
pub trait FileFetcher {
    fn fetch_file(
        &self,
        reference: &str,
        path: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Outcome of one lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum LookupResult {
    Known(String),
    Unknown(String),
}

impl LookupResult {
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Known(version) => Some(version),
            Self::Unknown(_) => None,
        }
    }

    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

/// Package name → lookup result, for exactly the names that were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMap {
    entries: BTreeMap<String, LookupResult>,
}

impl VersionMap {
    pub fn insert(&mut self, name: &str, result: LookupResult) {
        self.entries.insert(normalize_name(name), result);
    }

    /// Result for `name`; names that were never requested are unknown.
    #[must_use]
    pub fn get(&self, name: &str) -> LookupResult {
        self.entries
            .get(&normalize_name(name))
            .cloned()
            .unwrap_or_else(|| LookupResult::Unknown("not looked up".to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LookupResult)> {
        self.entries.iter()
    }

    /// Number of entries that could not be resolved.
    #[must_use]
    pub fn unknown_count(&self) -> usize {
        self.entries.values().filter(|r| !r.is_known()).count()
    }
}

/// Per-invocation memo of lookup results.
#[derive(Debug, Default)]
pub struct LookupCache {
    results: HashMap<String, LookupResult>,
}

impl LookupCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LookupResult> {
        self.results.get(name)
    }

    pub fn insert(&mut self, name: String, result: LookupResult) {
        self.results.insert(name, result);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Batched, retrying driver over a [`PackageIndex`].
pub struct VersionResolver<I> {
    index: I,
    cache: LookupCache,
    batch_size: usize,
    batch_pause: Duration,
    max_attempts: usize,
    retry_delay: Duration,
}

impl<I: PackageIndex> VersionResolver<I> {
    /// Resolver using the batching and retry limits of `config`.
    pub fn new(index: I, config: &ReleaseConfig) -> Self {
        Self {
            index,
            cache: LookupCache::new(),
            batch_size: config.batch_size.max(1),
            batch_pause: config.batch_pause(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(STARTING_BACKOFF_DELAY_MS),
        }
    }

    /// Override the first backoff delay (doubles on each retry).
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub const fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// Resolve the latest version of every name.
    ///
    /// Never fails: lookups that exhaust their attempts are recorded as unknown.
    pub async fn resolve<S: AsRef<str>>(&mut self, names: impl IntoIterator<Item = S>) -> VersionMap {
        let mut map = VersionMap::default();
        let mut issued = 0usize;

        for name in names {
            let name = normalize_name(name.as_ref());
            if let Some(cached) = self.cache.get(&name) {
                map.insert(&name, cached.clone());
                continue;
            }

            if issued > 0 && issued % self.batch_size == 0 && !self.batch_pause.is_zero() {
                debug!("Pausing {}ms after {issued} lookups", self.batch_pause.as_millis());
                tokio::time::sleep(self.batch_pause).await;
            }
            issued += 1;

            let result = match self.lookup(&name).await {
                Ok(version) => {
                    debug!("{name}: latest is {version}");
                    LookupResult::Known(version)
                }
                Err(e) => {
                    let reason = format!("{e:#}");
                    warn!(
                        "{}",
                        ReleaseError::ResolutionError {
                            name: name.clone(),
                            reason: reason.clone(),
                        }
                    );
                    LookupResult::Unknown(reason)
                }
            };
            self.cache.insert(name.clone(), result.clone());
            map.insert(&name, result);
        }

        info!("Resolved {} package(s), {} unknown", map.len(), map.unknown_count());
        map
    }

    async fn lookup(&self, name: &str) -> Result<String> {
        let strategy = backoff(self.retry_delay).take(self.max_attempts - 1);
        Retry::spawn(strategy, || async move {
            self.index.resolve_latest(name).await.inspect_err(|e| {
                debug!("Lookup of {name} failed: {e:#}");
            })
        })
        .await
    }
}

/// Doubling delays starting at `first`, capped at [`MAX_BACKOFF_DELAY_MS`].
fn backoff(first: Duration) -> impl Iterator<Item = Duration> {
    let first_ms = u64::try_from(first.as_millis()).unwrap_or(u64::MAX);
    ExponentialBackoff::from_millis(2)
        .factor(first_ms / 2)
        .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS))
}

/// Build the shared HTTP client used by the production indexes.
pub(crate) fn http_client(config: &ReleaseConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout())
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            ReleaseError::NetworkError {
                operation: "building HTTP client".to_string(),
                reason: e.to_string(),
            }
            .into()
        })
}

/// GET `url` and return the body, mapping transport and status failures to
/// [`ReleaseError::NetworkError`].
pub(crate) async fn get_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let network_error = |reason: String| ReleaseError::NetworkError {
        operation: format!("GET {url}"),
        reason,
    };

    let response = client.get(url).send().await.map_err(|e| network_error(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(network_error(format!("HTTP {status}")).into());
    }
    Ok(response.text().await.map_err(|e| network_error(e.to_string()))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakePackageIndex;

    fn fast_config(batch_size: usize, max_attempts: usize) -> ReleaseConfig {
        ReleaseConfig {
            batch_size,
            batch_pause_ms: 0,
            max_attempts,
            ..ReleaseConfig::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_known_and_unknown() {
        let index = FakePackageIndex::new().with_version("requests", "2.31.0");
        let mut resolver = VersionResolver::new(index, &fast_config(20, 1));

        let map = resolver.resolve(["requests", "missing-pkg"]).await;

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("requests"), LookupResult::Known("2.31.0".to_string()));
        assert!(!map.get("missing-pkg").is_known());
        assert_eq!(map.unknown_count(), 1);
    }

    #[tokio::test]
    async fn test_unrequested_name_is_unknown() {
        let map = VersionMap::default();
        assert!(matches!(map.get("anything"), LookupResult::Unknown(_)));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let index = FakePackageIndex::new().with_version("flaky", "1.0").failing_first("flaky", 2);
        let mut resolver = VersionResolver::new(index, &fast_config(20, 3))
            .with_retry_delay(Duration::from_millis(2));

        let map = resolver.resolve(["flaky"]).await;

        assert_eq!(map.get("flaky").version(), Some("1.0"));
        assert_eq!(resolver.index.calls("flaky"), 3);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let index = FakePackageIndex::new().with_version("flaky", "1.0").failing_first("flaky", 5);
        let mut resolver = VersionResolver::new(index, &fast_config(20, 2))
            .with_retry_delay(Duration::from_millis(2));

        let map = resolver.resolve(["flaky"]).await;

        assert!(!map.get("flaky").is_known());
        assert_eq!(resolver.index.calls("flaky"), 2);
    }

    #[tokio::test]
    async fn test_cache_prevents_second_lookup() {
        let index = FakePackageIndex::new().with_version("six", "1.16.0");
        let mut resolver = VersionResolver::new(index, &fast_config(1, 1));

        resolver.resolve(["six"]).await;
        let map = resolver.resolve(["Six", "six"]).await;

        assert_eq!(map.len(), 1);
        assert_eq!(resolver.index.calls("six"), 1);
        assert_eq!(resolver.cache().len(), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let delays: Vec<u64> = backoff(Duration::from_millis(200))
            .take(6)
            .map(|d| u64::try_from(d.as_millis()).unwrap())
            .collect();
        assert_eq!(delays, vec![200, 400, 800, 1600, 2000, 2000]);
    }
}
