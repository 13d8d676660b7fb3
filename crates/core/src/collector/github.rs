//! GitHub releases collector.
//!
//! Lists the first page (up to 100) of a repository's releases and keeps
//! published, non-prerelease ones. The artifact id is the `owner/repo` path.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{apply_filter, status_error, CollectedContent, CollectorError};
use super::Collector;
use crate::artifact::Artifact;
use crate::cache::{CacheConfig, TtlCache};
use crate::processor::Processor;

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_PER_PAGE: u64 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A release as returned by the GitHub API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// GitHub releases collector.
pub struct GithubCollector {
    client: Client,
    api_url: String,
    token: Option<String>,
    per_page: u64,
    releases: Option<TtlCache<String, Vec<GithubRelease>>>,
}

impl GithubCollector {
    /// Create a collector from processor settings (`api_url`, `token`, `per_page`, `timeout_secs`).
    pub fn new(processor: &Processor, cache: &CacheConfig) -> Result<Self, CollectorError> {
        let timeout = processor
            .settings
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let client = Client::builder()
            .user_agent(format!("artifact-tracker/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout))
            .build()?;

        let api_url = processor
            .setting_str("api_url")
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();

        let per_page = processor
            .settings
            .get("per_page")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, 100);

        Ok(Self {
            client,
            api_url,
            token: processor.setting_str("token").map(String::from),
            per_page,
            releases: cache.enabled.then(|| TtlCache::from_config(cache)),
        })
    }

    /// Published, non-prerelease releases of a repository.
    pub async fn get_releases(&self, repo: &str) -> Result<Vec<GithubRelease>, CollectorError> {
        if let Some(ref cache) = self.releases {
            if let Some(releases) = cache.get(&repo.to_string()) {
                debug!("GitHub releases for {} served from cache", repo);
                return Ok(releases);
            }
        }

        let result = self.get_release_page(repo, 1).await;
        match result {
            Ok(releases) => {
                let releases: Vec<GithubRelease> = releases
                    .into_iter()
                    .filter(|r| !r.prerelease && !r.draft)
                    .collect();
                if let Some(ref cache) = self.releases {
                    cache.insert(repo.to_string(), releases.clone());
                }
                Ok(releases)
            }
            Err(e) => {
                self.invalidate(repo);
                Err(e)
            }
        }
    }

    /// Drop the memoized release list of a repository.
    pub fn invalidate(&self, repo: &str) {
        if let Some(ref cache) = self.releases {
            cache.invalidate(&repo.to_string());
        }
    }

    async fn get_release_page(
        &self,
        repo: &str,
        page: u32,
    ) -> Result<Vec<GithubRelease>, CollectorError> {
        let url = format!("{}/repos/{}/releases", self.api_url, repo);
        debug!("GitHub releases: repo='{}', page={}", repo, page);

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .query(&[("page", page.to_string()), ("per_page", self.per_page.to_string())]);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, repo, body));
        }

        response
            .json()
            .await
            .map_err(|e| CollectorError::Parse(format!("Failed to parse releases: {}", e)))
    }
}

#[async_trait]
impl Collector for GithubCollector {
    fn kind(&self) -> &'static str {
        "github"
    }

    async fn fetch(&self, artifact: &Artifact) -> Result<CollectedContent, CollectorError> {
        let releases = self.get_releases(&artifact.id).await?;
        let tags: Vec<String> = releases.into_iter().map(|r| r.tag_name).collect();

        Ok(CollectedContent {
            versions: apply_filter(tags, artifact.filter.as_deref())?,
            dependencies: Vec::new(),
        })
    }
}
