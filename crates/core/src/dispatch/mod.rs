//! Dispatch policy: collect now, or enqueue for the worker pool.
//!
//! Every mutation path (add, track, sweep) asks [`decide`] so that all of
//! them agree for a given processor. `Processor::direct_collect` is the
//! only input.

use serde::{Deserialize, Serialize};

use crate::processor::Processor;

/// How collection work for a processor is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Collect inline on the caller's task.
    Direct,
    /// Enqueue a collection task and return.
    Queued,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Direct => "direct",
            DispatchMode::Queued => "queued",
        }
    }
}

/// Choose the dispatch mode for a processor.
pub fn decide(processor: &Processor) -> DispatchMode {
    if processor.direct_collect {
        DispatchMode::Direct
    } else {
        DispatchMode::Queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::CollectorKind;

    #[test]
    fn test_direct_collect_processor_is_direct() {
        let processor = Processor::new("release-repo", CollectorKind::Github, true);
        assert_eq!(decide(&processor), DispatchMode::Direct);
    }

    #[test]
    fn test_queued_processor_is_queued() {
        let processor = Processor::new("npm", CollectorKind::Npm, false);
        assert_eq!(decide(&processor), DispatchMode::Queued);
    }

    #[test]
    fn test_kind_and_settings_do_not_affect_policy() {
        let mut processor = Processor::new("npm", CollectorKind::None, false);
        processor
            .settings
            .insert("direct_collect".to_string(), serde_json::json!(true));
        assert_eq!(decide(&processor), DispatchMode::Queued);
    }

    #[test]
    fn test_mode_serialization() {
        assert_eq!(
            serde_json::to_string(&DispatchMode::Direct).unwrap(),
            "\"direct\""
        );
        assert_eq!(DispatchMode::Queued.as_str(), "queued");
    }
}
