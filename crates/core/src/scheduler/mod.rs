//! Cron-driven re-track trigger.

mod config;
mod trigger;

pub use config::SchedulerConfig;
pub use trigger::{SchedulerError, SchedulerState, SweepTarget, TrackingScheduler};

pub(crate) use trigger::parse_schedule;
