//! Prompt definitions and answer-dependent templating.
//!
//! A prompt's text may reference a prior answer with `{answer:<prompt_key>}`.
//! The placeholder is replaced with the participant's most recent usable
//! answer to that prompt, or with the prompt's fallback text.

use crate::error::{CheckinError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Placeholder opening sequence.
const SLOT_OPEN: &str = "{answer:";

/// Substituted when a referenced slot has no usable prior answer.
pub const DEFAULT_FALLBACK: &str = "your previous goals";

/// Longest accepted answer window: one week.
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

fn default_timeout_secs() -> u64 {
    3600
}

/// How a prompt collects its answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerMode {
    /// Any text reply from the participant.
    #[default]
    FreeText,
    /// One reaction from a fixed symbol set.
    ChoiceReaction {
        /// Allowed symbols, seeded on the prompt message in this order.
        choices: Vec<String>,
    },
}

/// One question in a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Stable slot name. Answers are stored under it.
    pub key: String,
    /// Text template.
    pub text: String,
    /// Answer collection mode.
    #[serde(default)]
    pub answer: AnswerMode,
    /// Seconds to wait for an answer.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Replacement for placeholders with no usable prior answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl Prompt {
    /// Free-text prompt with the default one-hour timeout.
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
            answer: AnswerMode::FreeText,
            timeout_secs: default_timeout_secs(),
            fallback: None,
        }
    }

    /// Switch to reaction mode with the given choices.
    #[must_use]
    pub fn with_choices<S: Into<String>>(mut self, choices: impl IntoIterator<Item = S>) -> Self {
        self.answer = AnswerMode::ChoiceReaction {
            choices: choices.into_iter().map(Into::into).collect(),
        };
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// Answer window, capped at [`MAX_TIMEOUT_SECS`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.min(MAX_TIMEOUT_SECS))
    }

    pub fn fallback_text(&self) -> &str {
        self.fallback.as_deref().unwrap_or(DEFAULT_FALLBACK)
    }

    /// Prompt keys referenced by placeholders, in order of appearance.
    pub fn referenced_slots(&self) -> Vec<&str> {
        let mut slots = Vec::new();
        let mut rest = self.text.as_str();
        while let Some(start) = rest.find(SLOT_OPEN) {
            let after = &rest[start + SLOT_OPEN.len()..];
            let Some(end) = after.find('}') else {
                break;
            };
            slots.push(after[..end].trim());
            rest = &after[end + 1..];
        }
        slots
    }

    /// Render the template, resolving each slot through `lookup`.
    ///
    /// `lookup` returns `None` when no usable prior answer exists. An
    /// unterminated placeholder is left as literal text.
    pub fn render(&self, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        while let Some(start) = rest.find(SLOT_OPEN) {
            let after = &rest[start + SLOT_OPEN.len()..];
            let Some(end) = after.find('}') else {
                break;
            };
            out.push_str(&rest[..start]);
            let slot = after[..end].trim();
            match lookup(slot) {
                Some(value) => out.push_str(&value),
                None => out.push_str(self.fallback_text()),
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

/// Validate a campaign's prompt list.
///
/// # Errors
///
/// Returns [`CheckinError::InvalidConfig`] describing the first problem.
pub fn validate_prompts(prompts: &[Prompt]) -> Result<()> {
    if prompts.is_empty() {
        return Err(CheckinError::InvalidConfig(
            "campaign needs at least one prompt".to_owned(),
        ));
    }

    let mut keys = HashSet::new();
    for (index, prompt) in prompts.iter().enumerate() {
        let key = prompt.key.trim();
        if key.is_empty() {
            return Err(CheckinError::InvalidConfig(format!("prompt #{index} has an empty key")));
        }
        if !keys.insert(key) {
            return Err(CheckinError::InvalidConfig(format!("duplicate prompt key `{key}`")));
        }
        if prompt.text.trim().is_empty() {
            return Err(CheckinError::InvalidConfig(format!("prompt `{key}` has empty text")));
        }
        if prompt.timeout_secs == 0 {
            return Err(CheckinError::InvalidConfig(format!(
                "prompt `{key}` needs a timeout above zero"
            )));
        }
        if prompt.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(CheckinError::InvalidConfig(format!(
                "prompt `{key}` timeout of {}s exceeds the {MAX_TIMEOUT_SECS}s limit",
                prompt.timeout_secs
            )));
        }
        if let AnswerMode::ChoiceReaction { choices } = &prompt.answer {
            if choices.is_empty() {
                return Err(CheckinError::InvalidConfig(format!(
                    "reaction prompt `{key}` has no choices"
                )));
            }
            let unique: HashSet<&String> = choices.iter().collect();
            if unique.len() != choices.len() || choices.iter().any(|c| c.trim().is_empty()) {
                return Err(CheckinError::InvalidConfig(format!(
                    "reaction prompt `{key}` has blank or repeated choices"
                )));
            }
        }
    }

    for prompt in prompts {
        for slot in prompt.referenced_slots() {
            if !keys.contains(slot) {
                return Err(CheckinError::InvalidConfig(format!(
                    "prompt `{}` references unknown slot `{slot}`",
                    prompt.key
                )));
            }
        }
    }

    Ok(())
}

/// The questions the deployed bot always asked.
pub fn default_prompts() -> Vec<Prompt> {
    vec![
        Prompt::new("accomplished", "What did you accomplish today?"),
        Prompt::new("challenges", "What challenges did you face?"),
        Prompt::new("goals", "What are your goals for tomorrow?"),
    ]
}
