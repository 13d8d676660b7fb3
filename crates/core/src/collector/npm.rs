//! npm registry collector.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::types::{apply_filter, status_error, CollectedContent, CollectorError};
use super::Collector;
use crate::artifact::Artifact;
use crate::processor::Processor;

const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct Packument {
    #[serde(default)]
    versions: BTreeMap<String, PackageVersion>,
    #[serde(default, rename = "dist-tags")]
    dist_tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PackageVersion {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

/// npm registry collector.
///
/// Reports every published version and, as discovered dependencies, the
/// runtime dependencies of the `latest` dist-tag.
pub struct NpmCollector {
    client: Client,
    registry_url: String,
}

impl NpmCollector {
    /// Create a collector from processor settings (`registry_url`, `timeout_secs`).
    pub fn new(processor: &Processor) -> Result<Self, CollectorError> {
        let timeout = processor
            .settings
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let client = Client::builder()
            .user_agent(format!("artifact-tracker/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout))
            .build()?;

        let registry_url = processor
            .setting_str("registry_url")
            .unwrap_or(DEFAULT_REGISTRY_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            registry_url,
        })
    }

    async fn get_packument(&self, name: &str) -> Result<Packument, CollectorError> {
        // Scoped packages keep the '@' but escape the separator.
        let url = format!("{}/{}", self.registry_url, name.replace('/', "%2F"));
        debug!("npm packument: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, name, body));
        }

        response
            .json()
            .await
            .map_err(|e| CollectorError::Parse(format!("Failed to parse packument: {}", e)))
    }
}

#[async_trait]
impl Collector for NpmCollector {
    fn kind(&self) -> &'static str {
        "npm"
    }

    async fn fetch(&self, artifact: &Artifact) -> Result<CollectedContent, CollectorError> {
        let packument = self.get_packument(&artifact.id).await?;

        let dependencies: Vec<String> = packument
            .dist_tags
            .get("latest")
            .and_then(|latest| packument.versions.get(latest))
            .map(|v| v.dependencies.keys().cloned().collect())
            .unwrap_or_default();

        let versions: Vec<String> = packument.versions.into_keys().collect();

        Ok(CollectedContent {
            versions: apply_filter(versions, artifact.filter.as_deref())?,
            dependencies,
        })
    }
}
