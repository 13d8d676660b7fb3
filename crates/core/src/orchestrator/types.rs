//! Types for the artifact tracker.

use serde::Serialize;

use crate::artifact::{Artifact, ArtifactKey};
use crate::catalog::CatalogError;
use crate::dispatch::DispatchMode;
use crate::worker::{CollectError, EnqueueOutcome};

/// Error type for tracker operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// No catalog record for the key.
    #[error("Artifact not found: {0}")]
    NotFound(ArtifactKey),

    /// The processor is not registered.
    #[error("Unknown processor: {0}")]
    UnknownProcessor(String),

    /// Collection work could not be carried out or accepted.
    #[error("Dispatch failed for {key}: {reason}")]
    DispatchFailure { key: ArtifactKey, reason: String },

    /// A catalog mutation did not take effect.
    #[error("Operation failed: {0}")]
    OperationFailure(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl TrackerError {
    pub(crate) fn from_collect(key: ArtifactKey, err: CollectError) -> Self {
        match err {
            CollectError::UnknownProcessor(name) => TrackerError::UnknownProcessor(name),
            CollectError::Missing(key) => TrackerError::NotFound(key),
            CollectError::Catalog(e) => TrackerError::Catalog(e),
            other => TrackerError::DispatchFailure {
                key,
                reason: other.to_string(),
            },
        }
    }
}

/// Result of adding an artifact.
#[derive(Debug, Clone)]
pub enum AddOutcome {
    /// A new record was created and collection dispatched.
    Added {
        artifact: Artifact,
        dispatched: Dispatched,
    },
    /// An existing dependency became root and collection was dispatched.
    Promoted {
        artifact: Artifact,
        dispatched: Dispatched,
    },
    /// Nothing changed.
    AlreadyExists(Artifact),
}

impl AddOutcome {
    pub fn artifact(&self) -> &Artifact {
        match self {
            AddOutcome::Added { artifact, .. } => artifact,
            AddOutcome::Promoted { artifact, .. } => artifact,
            AddOutcome::AlreadyExists(artifact) => artifact,
        }
    }

    pub fn is_new_work(&self) -> bool {
        !matches!(self, AddOutcome::AlreadyExists(_))
    }

    /// Human readable summary.
    pub fn message(&self) -> String {
        let key = self.artifact().key();
        match self {
            AddOutcome::Added { .. } => format!("Added {}", key),
            AddOutcome::Promoted { .. } => format!("Promoted {} to root", key),
            AddOutcome::AlreadyExists(_) => format!("{} already exists", key),
        }
    }
}

/// How accepted collection work was carried out.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Dispatched {
    /// Collected inline; holds the updated record.
    Collected { artifact: Artifact },
    /// Handed to the worker pool.
    Queued { outcome: EnqueueOutcome },
}

impl Dispatched {
    /// The dispatch mode that produced this result.
    pub fn mode(&self) -> DispatchMode {
        match self {
            Dispatched::Collected { .. } => DispatchMode::Direct,
            Dispatched::Queued { .. } => DispatchMode::Queued,
        }
    }
}

/// Result of a re-track sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Artifacts enumerated.
    pub total: usize,
    /// Artifacts whose work was accepted.
    pub dispatched: usize,
    /// Artifacts whose dispatch failed, with the reason.
    pub failed: Vec<(ArtifactKey, String)>,
}

/// Result of a validation sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub checked: usize,
    pub valid: usize,
    /// Artifacts that no longer resolve, with the reason.
    pub invalid: Vec<(ArtifactKey, String)>,
}
