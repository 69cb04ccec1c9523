//! Calendar-driven job scheduler.
//!
//! Jobs bind a [`CalendarRule`] to an async callback. The scheduler knows
//! nothing about what the callbacks do.

pub mod rule;
pub mod runner;

pub use rule::{CalendarRule, Weekday};
pub use runner::{JobCallback, JobHandle, JobSummary, Scheduler, TriggerOutcome};
