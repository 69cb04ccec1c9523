//! Answer history types persisted by the response store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Participant identifier used as the store key.
pub type ParticipantId = String;

/// Text shown wherever a prompt was never answered.
pub const NO_RESPONSE_TEXT: &str = "No response";

/// The recorded value of one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    /// Free-text reply.
    Text(String),
    /// Reaction symbol picked from the prompt's allowed set.
    Choice(String),
    /// Timed out or failed collection. A valid terminal value.
    NoResponse,
}

impl AnswerValue {
    /// Returns the answer content, or `None` for [`AnswerValue::NoResponse`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) | Self::Choice(text) => Some(text),
            Self::NoResponse => None,
        }
    }

    /// Returns `true` for the `NoResponse` sentinel.
    #[must_use]
    pub fn is_no_response(&self) -> bool {
        matches!(self, Self::NoResponse)
    }
}

impl std::fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_text().unwrap_or(NO_RESPONSE_TEXT))
    }
}

/// A note attached to an existing answer after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Who wrote the comment.
    pub author: String,
    /// Comment body.
    pub text: String,
    /// When the comment was attached.
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Create a comment stamped with the current time.
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// One participant's response to one prompt in one campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Campaign run that collected this answer.
    pub run_id: Uuid,
    /// Stable prompt slot name, used by templating.
    pub prompt_key: String,
    /// Prompt text exactly as it was sent.
    pub prompt: String,
    /// Collected value.
    pub value: AnswerValue,
    /// When the answer was recorded.
    pub answered_at: DateTime<Utc>,
    /// Comments attached later.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

impl Answer {
    /// Create an answer stamped with the current time.
    pub fn new(
        run_id: Uuid,
        prompt_key: impl Into<String>,
        prompt: impl Into<String>,
        value: AnswerValue,
    ) -> Self {
        Self {
            run_id,
            prompt_key: prompt_key.into(),
            prompt: prompt.into(),
            value,
            answered_at: Utc::now(),
            comments: Vec::new(),
        }
    }

    /// Create a `NoResponse` answer.
    pub fn no_response(run_id: Uuid, prompt_key: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(run_id, prompt_key, prompt, AnswerValue::NoResponse)
    }
}

/// Append-only answer history for one participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    /// Answers across all runs, oldest first.
    #[serde(default)]
    pub answers: Vec<Answer>,
}

impl ParticipantRecord {
    /// Answers collected by one run, in prompt order.
    #[must_use]
    pub fn answers_for_run(&self, run_id: Uuid) -> Vec<&Answer> {
        self.answers.iter().filter(|a| a.run_id == run_id).collect()
    }

    /// Most recent answer to `prompt_key`, optionally ignoring one run.
    #[must_use]
    pub fn latest_answer(&self, prompt_key: &str, excluding_run: Option<Uuid>) -> Option<&Answer> {
        self.answers
            .iter()
            .rev()
            .filter(|a| Some(a.run_id) != excluding_run)
            .find(|a| a.prompt_key == prompt_key)
    }
}

/// On-disk layout of the response store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreFile {
    /// Schema version.
    #[serde(default = "default_store_version")]
    pub version: u8,
    /// Full participant mapping.
    #[serde(default)]
    pub participants: BTreeMap<ParticipantId, ParticipantRecord>,
}

pub(crate) fn default_store_version() -> u8 {
    1
}
