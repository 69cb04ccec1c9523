//! Rollcall: scheduled check-in campaigns over chat direct messages.
//!
//! At calendar-triggered times the engine walks a roster, asks every
//! participant a fixed sequence of questions in a private channel, stores
//! each answer as soon as it arrives, and publishes one report per run. A
//! second job posts a daily reminder to a shared channel.
//!
//! # Architecture
//!
//! - **Scheduler** fires jobs from [`scheduler::CalendarRule`]s
//! - **Batch retry** re-runs a campaign whose roster or report channel failed
//! - **Campaign runner** isolates each participant's conversation
//! - **Conversation** sends prompts, collects replies with timeouts, and
//!   renders templates from earlier answers
//! - **Response store** keeps every answer in a crash-safe JSON file
//! - **Messaging** is the chat platform boundary (Discord in production)

pub mod campaign;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod messaging;
pub mod paths;
pub mod reminder;
pub mod retry;
pub mod scheduler;
pub mod store;

pub use campaign::{CampaignRunner, Prompt, Report};
pub use config::RollcallConfig;
pub use engine::CheckinEngine;
pub use error::{CheckinError, Result};
pub use messaging::MessagingPort;
pub use store::ResponseStore;
