//! Types for tracked artifacts.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of an artifact: unique per (processor, id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// Processor (ecosystem) name.
    pub processor: String,
    /// Artifact id within the processor (package name, repository, ...).
    pub id: String,
}

impl ArtifactKey {
    pub fn new(processor: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            processor: processor.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.processor, self.id)
    }
}

/// Collection status of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Known to the catalog, never collected.
    #[default]
    Registered,
    /// A collection task has been accepted for it.
    Queued,
    /// A worker is collecting it right now.
    Collecting,
    /// Last collection succeeded.
    Collected,
    /// Last collection (or validation) failed.
    Failed,
}

impl ArtifactStatus {
    pub const ALL: [ArtifactStatus; 5] = [
        ArtifactStatus::Registered,
        ArtifactStatus::Queued,
        ArtifactStatus::Collecting,
        ArtifactStatus::Collected,
        ArtifactStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Registered => "registered",
            ArtifactStatus::Queued => "queued",
            ArtifactStatus::Collecting => "collecting",
            ArtifactStatus::Collected => "collected",
            ArtifactStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "registered" => Some(ArtifactStatus::Registered),
            "queued" => Some(ArtifactStatus::Queued),
            "collecting" => Some(ArtifactStatus::Collecting),
            "collected" => Some(ArtifactStatus::Collected),
            "failed" => Some(ArtifactStatus::Failed),
            _ => None,
        }
    }
}

/// A tracked artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact id, unique within its processor.
    pub id: String,
    /// Owning processor name.
    pub processor: String,
    /// True when explicitly registered, false when only discovered as a dependency.
    pub root: bool,
    /// Constrains which versions/releases are relevant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Processor-specific configuration, opaque to the tracker.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Current collection status.
    pub status: ArtifactStatus,
    /// Versions seen by the last successful collection.
    #[serde(default)]
    pub versions: Vec<String>,
    /// Reason of the last failure, cleared on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// When tracking work was last accepted for this artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tracked_at: Option<DateTime<Utc>>,
    /// When the last successful collection finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_collected_at: Option<DateTime<Utc>>,
}

impl Artifact {
    /// A freshly registered artifact.
    pub fn new(id: impl Into<String>, processor: impl Into<String>, root: bool) -> Self {
        Self {
            id: id.into(),
            processor: processor.into(),
            root,
            filter: None,
            config: serde_json::Value::Null,
            status: ArtifactStatus::Registered,
            versions: Vec::new(),
            last_error: None,
            last_tracked_at: None,
            last_collected_at: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(&self.processor, &self.id)
    }
}

/// Filter for listing artifacts.
#[derive(Debug, Clone, Default)]
pub struct ArtifactFilter {
    /// Restrict to a single processor.
    pub processor: Option<String>,
    /// Only artifacts registered explicitly.
    pub only_roots: bool,
}

impl ArtifactFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = Some(processor.into());
        self
    }

    pub fn only_roots(mut self, only_roots: bool) -> Self {
        self.only_roots = only_roots;
        self
    }
}

/// A unit of collection work, handed to a worker inline or through the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionTask {
    /// Correlation id for logs.
    pub task_id: String,
    pub id: String,
    pub processor: String,
    /// Filter snapshot at enqueue time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Config snapshot at enqueue time.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Create the record when it is missing. Otherwise a missing record
    /// means the artifact was deleted and the task is skipped.
    #[serde(default)]
    pub create_if_missing: bool,
}

impl CollectionTask {
    /// Task for an artifact the catalog already knows.
    pub fn for_artifact(artifact: &Artifact) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            id: artifact.id.clone(),
            processor: artifact.processor.clone(),
            filter: artifact.filter.clone(),
            config: artifact.config.clone(),
            create_if_missing: false,
        }
    }

    /// Task for an arbitrary (possibly unknown) id/processor pair.
    pub fn new(id: impl Into<String>, processor: impl Into<String>) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            id: id.into(),
            processor: processor.into(),
            filter: None,
            config: serde_json::Value::Null,
            create_if_missing: false,
        }
    }

    /// Let the worker create the artifact if it does not exist.
    pub fn create_if_missing(mut self) -> Self {
        self.create_if_missing = true;
        self
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(&self.processor, &self.id)
    }
}
