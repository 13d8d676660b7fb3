//! Types shared by collectors.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while collecting.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream does not know the artifact.
    #[error("Artifact not found upstream: {0}")]
    NotFound(String),

    /// Upstream rate limit hit.
    #[error("Rate limit exceeded, please wait before retrying")]
    RateLimited,

    /// Upstream returned an error.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse the response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The artifact filter is not a valid pattern.
    #[error("Invalid filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// Collector misconfigured.
    #[error("Collector not configured: {0}")]
    NotConfigured(String),

    /// The fetch did not finish in time.
    #[error("Collection timed out after {0}s")]
    Timeout(u64),
}

/// What a collector found for an artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectedContent {
    /// Relevant versions (after filtering).
    pub versions: Vec<String>,
    /// Ids of artifacts this one depends on, in the same processor.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Keep versions matching the artifact filter; no filter keeps everything.
pub fn apply_filter(
    versions: Vec<String>,
    filter: Option<&str>,
) -> Result<Vec<String>, CollectorError> {
    let Some(pattern) = filter.filter(|f| !f.is_empty()) else {
        return Ok(versions);
    };

    let regex = Regex::new(pattern).map_err(|e| CollectorError::InvalidFilter {
        filter: pattern.to_string(),
        reason: e.to_string(),
    })?;

    Ok(versions.into_iter().filter(|v| regex.is_match(v)).collect())
}

/// Map a non-success HTTP status to a collector error.
pub(crate) fn status_error(status: reqwest::StatusCode, subject: &str, body: String) -> CollectorError {
    match status.as_u16() {
        404 => CollectorError::NotFound(subject.to_string()),
        429 => CollectorError::RateLimited,
        403 if body.to_lowercase().contains("rate limit") => CollectorError::RateLimited,
        code => CollectorError::Api {
            status: code,
            message: body,
        },
    }
}
