//! Processors: one per external ecosystem (npm, GitHub releases, ...).
//!
//! Processor records are configured up front and only read at runtime.
//! The `direct_collect` flag drives the dispatch policy, `kind` selects the
//! collector and `settings` are handed to the collector untouched.

mod config;
mod types;

pub use config::ProcessorConfig;
pub use types::{CollectorKind, Processor};
