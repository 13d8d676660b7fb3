//! Types for processors.

use serde::{Deserialize, Serialize};

/// Which collector implementation serves a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollectorKind {
    /// GitHub releases of a repository.
    Github,
    /// Packages from an npm registry.
    Npm,
    /// No collector; artifacts are catalogued only.
    #[default]
    None,
}

impl CollectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorKind::Github => "github",
            CollectorKind::Npm => "npm",
            CollectorKind::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "github" => Some(CollectorKind::Github),
            "npm" => Some(CollectorKind::Npm),
            "none" => Some(CollectorKind::None),
            _ => None,
        }
    }
}

/// A processor record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Processor {
    /// Unique processor name.
    pub name: String,
    /// Collect synchronously on registration instead of queuing.
    pub direct_collect: bool,
    /// Collector implementation.
    pub kind: CollectorKind,
    /// Collector-specific settings.
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl Processor {
    pub fn new(name: impl Into<String>, kind: CollectorKind, direct_collect: bool) -> Self {
        Self {
            name: name.into(),
            direct_collect,
            kind,
            settings: serde_json::Map::new(),
        }
    }

    /// String setting lookup.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }
}
