//! Per-participant conversation: asks each prompt in order over a private
//! channel, collects one answer per prompt, and persists every answer before
//! moving on.

use crate::campaign::prompt::{AnswerMode, Prompt};
use crate::error::Result;
use crate::messaging::{
    ChannelRef, MessageRef, MessagingError, MessagingPort, Participant, ReactionFilter, ReplyFilter,
};
use crate::store::{Answer, AnswerValue, ResponseStore};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Where a conversation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    NotStarted,
    AwaitingAnswer(usize),
    Answered(usize),
    TimedOut(usize),
    Completed,
    Aborted,
}

impl ConversationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// Terminal result of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    /// Every prompt processed; one answer per prompt, in prompt order.
    Completed(Vec<Answer>),
    /// The participant could not be reached. `answers` still holds one
    /// entry per prompt, `NoResponse` from the point of failure on.
    Aborted { reason: String, answers: Vec<Answer> },
}

/// Shared collaborators for every conversation of one run.
#[derive(Clone)]
pub struct ConversationContext {
    pub port: Arc<dyn MessagingPort>,
    pub store: Arc<ResponseStore>,
    pub prompts: Arc<[Prompt]>,
    pub run_id: Uuid,
    /// Delete collected replies after recording them.
    pub cleanup_replies: bool,
}

/// Collection failure that ends the whole conversation.
struct Unreachable(String);

/// Drives one participant through the prompt list.
pub struct Conversation {
    ctx: ConversationContext,
    participant: Participant,
    state: ConversationState,
    answers: Vec<Answer>,
}

impl Conversation {
    pub fn new(ctx: ConversationContext, participant: Participant) -> Self {
        let capacity = ctx.prompts.len();
        Self {
            ctx,
            participant,
            state: ConversationState::NotStarted,
            answers: Vec::with_capacity(capacity),
        }
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// Run to `Completed` or `Aborted`.
    ///
    /// # Errors
    ///
    /// Only storage failures are returned; messaging failures end up as
    /// `NoResponse` answers or an `Aborted` outcome.
    pub async fn run(mut self) -> Result<ConversationOutcome> {
        let channel = match self.ctx.port.open_direct_channel(&self.participant).await {
            Ok(channel) => channel,
            Err(e) => return self.abort(0, e.to_string()),
        };

        let prompts = Arc::clone(&self.ctx.prompts);
        for (index, prompt) in prompts.iter().enumerate() {
            self.state = ConversationState::AwaitingAnswer(index);
            let text = self.render(prompt)?;

            let value = match self.ask(&channel, prompt, &text).await {
                Ok(value) => value,
                Err(Unreachable(reason)) => return self.abort(index, reason),
            };

            self.state = if value.is_no_response() {
                ConversationState::TimedOut(index)
            } else {
                ConversationState::Answered(index)
            };
            debug!(
                participant = %self.participant.id,
                prompt = %prompt.key,
                answered = !value.is_no_response(),
                "prompt finished"
            );

            self.record(Answer::new(self.ctx.run_id, &prompt.key, text, value))?;
        }

        self.state = ConversationState::Completed;
        Ok(ConversationOutcome::Completed(self.answers))
    }

    fn render(&self, prompt: &Prompt) -> Result<String> {
        // Resolve slots up front so storage errors surface instead of
        // silently degrading to fallback text.
        let mut resolved = Vec::new();
        for slot in prompt.referenced_slots() {
            let prior = self
                .ctx
                .store
                .latest_answer(&self.participant.id, slot, Some(self.ctx.run_id))?
                .and_then(|a| a.value.as_text().map(str::to_owned));
            resolved.push((slot.to_owned(), prior));
        }
        Ok(prompt.render(|slot| {
            resolved
                .iter()
                .find(|(s, _)| s == slot)
                .and_then(|(_, v)| v.clone())
        }))
    }

    /// Send one prompt and collect its answer.
    async fn ask(
        &self,
        channel: &ChannelRef,
        prompt: &Prompt,
        text: &str,
    ) -> std::result::Result<AnswerValue, Unreachable> {
        let message = match self.ctx.port.send_message(channel, text).await {
            Ok(message) => message,
            Err(MessagingError::Unreachable(reason)) => return Err(Unreachable(reason)),
            Err(e) => {
                warn!(
                    participant = %self.participant.id,
                    prompt = %prompt.key,
                    "failed to send prompt: {e}"
                );
                return Ok(AnswerValue::NoResponse);
            }
        };

        let value = match &prompt.answer {
            AnswerMode::FreeText => self.collect_text(channel, prompt).await,
            AnswerMode::ChoiceReaction { choices } => {
                self.collect_choice(&message, prompt, choices).await
            }
        };
        Ok(value)
    }

    async fn collect_text(&self, channel: &ChannelRef, prompt: &Prompt) -> AnswerValue {
        let timeout = prompt.timeout();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            warn!(prompt = %prompt.key, "answer window of {}s is out of range", timeout.as_secs());
            return AnswerValue::NoResponse;
        };
        let filter = ReplyFilter {
            author: self.participant.id.clone(),
        };

        match self.ctx.port.await_reply(channel, &filter, timeout).await {
            // Arriving exactly at the deadline counts as too late.
            Ok(reply) if reply.received_at >= deadline => {
                debug!(participant = %self.participant.id, "reply arrived at or after deadline");
                AnswerValue::NoResponse
            }
            Ok(reply) => {
                if self.ctx.cleanup_replies {
                    self.cleanup(&reply.message).await;
                }
                AnswerValue::Text(reply.text.trim().to_owned())
            }
            Err(e) => self.no_response(prompt, &e),
        }
    }

    async fn collect_choice(&self, message: &MessageRef, prompt: &Prompt, choices: &[String]) -> AnswerValue {
        let timeout = prompt.timeout();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            warn!(prompt = %prompt.key, "answer window of {}s is out of range", timeout.as_secs());
            return AnswerValue::NoResponse;
        };

        for symbol in choices {
            if let Err(e) = self.ctx.port.add_reaction(message, symbol).await {
                debug!("could not seed reaction {symbol}: {e}");
            }
        }

        let filter = ReactionFilter {
            user: self.participant.id.clone(),
            allowed: choices.to_vec(),
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.ctx.port.await_reaction(message, &filter, remaining).await {
            Ok(reaction) if reaction.received_at >= deadline || !filter.allows(&reaction.symbol) => {
                AnswerValue::NoResponse
            }
            Ok(reaction) => AnswerValue::Choice(reaction.symbol),
            Err(e) => self.no_response(prompt, &e),
        }
    }

    fn no_response(&self, prompt: &Prompt, err: &MessagingError) -> AnswerValue {
        match err {
            MessagingError::Timeout => {
                debug!(participant = %self.participant.id, prompt = %prompt.key, "no answer before timeout");
            }
            other => {
                warn!(
                    participant = %self.participant.id,
                    prompt = %prompt.key,
                    "answer collection failed: {other}"
                );
            }
        }
        AnswerValue::NoResponse
    }

    async fn cleanup(&self, message: &MessageRef) {
        if let Err(e) = self.ctx.port.delete_message(message).await {
            debug!("could not delete collected reply {}: {e}", message.id);
        }
    }

    fn record(&mut self, answer: Answer) -> Result<()> {
        self.ctx.store.append(&self.participant.id, answer.clone())?;
        self.answers.push(answer);
        Ok(())
    }

    /// Pad the remaining prompts with `NoResponse` and stop.
    fn abort(mut self, from: usize, reason: String) -> Result<ConversationOutcome> {
        warn!(
            participant = %self.participant.id,
            label = %self.participant.label,
            "conversation aborted: {reason}"
        );
        let prompts = Arc::clone(&self.ctx.prompts);
        for prompt in prompts.iter().skip(from) {
            let text = self.render(prompt)?;
            self.record(Answer::no_response(self.ctx.run_id, &prompt.key, text))?;
        }
        self.state = ConversationState::Aborted;
        Ok(ConversationOutcome::Aborted {
            reason,
            answers: self.answers,
        })
    }
}
