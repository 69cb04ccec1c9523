//! Check-in campaigns: prompts, per-participant conversations, the roster
//! runner, and the reports they produce.

pub mod conversation;
pub mod prompt;
pub mod report;
pub mod runner;

pub use conversation::{Conversation, ConversationContext, ConversationOutcome, ConversationState};
pub use prompt::{AnswerMode, Prompt};
pub use report::{ParticipantOutcome, Report, ReportEntry};
pub use runner::{CampaignRunner, CampaignSettings, run_campaign_with_retry};
