//! In-memory [`MessagingPort`] driven by pre-scripted participant behaviour.
//!
//! Every participant gets a DM channel named `dm:<id>`. Replies are popped
//! from a per-participant queue in prompt order; an empty queue behaves like
//! a participant who never answers. All sends, reactions, deletions and
//! published reports are recorded for inspection.

use crate::campaign::Report;
use crate::messaging::traits::{
    ChannelRef, MessageRef, MessagingError, MessagingPort, Participant, Reaction, ReactionFilter,
    Reply, ReplyFilter,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

const DM_PREFIX: &str = "dm:";

/// Scripted participant behaviour for one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Reply immediately with text.
    Text(String),
    /// React immediately with a symbol.
    Reaction(String),
    /// Reply with text after a delay. Replies later than the prompt
    /// timeout are never delivered.
    Delayed { after: Duration, text: String },
    /// Never answer.
    Silent,
}

impl ScriptedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn reaction(symbol: impl Into<String>) -> Self {
        Self::Reaction(symbol.into())
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    roster: Vec<Participant>,
    roster_failures: u32,
    roster_calls: u32,
    report_channel_down: bool,
    publish_failures: u32,
    unreachable: HashSet<String>,
    /// Participant id -> number of prompts delivered before DMs close.
    closes_after: HashMap<String, usize>,
    replies: HashMap<String, VecDeque<ScriptedReply>>,
    sent: Vec<(ChannelRef, String)>,
    reactions_added: Vec<(MessageRef, String)>,
    deleted: Vec<MessageRef>,
    reports: Vec<Report>,
    next_message_id: u64,
}

/// Scripted in-memory messaging port.
#[derive(Debug, Default)]
pub struct ScriptedMessenger {
    state: Mutex<ScriptState>,
}

impl ScriptedMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a roster member with their scripted replies.
    #[must_use]
    pub fn with_participant(self, participant: Participant, replies: Vec<ScriptedReply>) -> Self {
        {
            let mut state = self.lock();
            state
                .replies
                .insert(participant.id.clone(), replies.into_iter().collect());
            state.roster.push(participant);
        }
        self
    }

    /// Add a roster member whose private channel cannot be opened.
    #[must_use]
    pub fn with_unreachable(self, participant: Participant) -> Self {
        {
            let mut state = self.lock();
            state.unreachable.insert(participant.id.clone());
            state.roster.push(participant);
        }
        self
    }

    /// Accept `delivered` prompts to this participant, then refuse further
    /// direct messages as if they closed their DMs mid-run.
    #[must_use]
    pub fn with_dm_closed_after(self, participant_id: &str, delivered: usize) -> Self {
        self.lock()
            .closes_after
            .insert(participant_id.to_owned(), delivered);
        self
    }

    /// Fail the next `count` roster lookups.
    #[must_use]
    pub fn with_roster_failures(self, count: u32) -> Self {
        self.lock().roster_failures = count;
        self
    }

    /// Fail the next `count` report publications.
    #[must_use]
    pub fn with_publish_failures(self, count: u32) -> Self {
        self.lock().publish_failures = count;
        self
    }

    /// Make every channel verification fail.
    #[must_use]
    pub fn with_report_channel_down(self) -> Self {
        self.lock().report_channel_down = true;
        self
    }

    /// Queue more replies for a participant.
    pub fn push_replies(&self, participant_id: &str, replies: Vec<ScriptedReply>) {
        self.lock()
            .replies
            .entry(participant_id.to_owned())
            .or_default()
            .extend(replies);
    }

    /// Every message sent so far, in order.
    pub fn sent(&self) -> Vec<(ChannelRef, String)> {
        self.lock().sent.clone()
    }

    /// Messages sent to one participant's DM channel.
    pub fn sent_to(&self, participant_id: &str) -> Vec<String> {
        let channel = dm_channel(participant_id);
        self.lock()
            .sent
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Reactions the bot seeded on its own messages.
    pub fn reactions_added(&self) -> Vec<(MessageRef, String)> {
        self.lock().reactions_added.clone()
    }

    /// Messages deleted so far.
    pub fn deleted(&self) -> Vec<MessageRef> {
        self.lock().deleted.clone()
    }

    /// Reports published so far.
    pub fn reports(&self) -> Vec<Report> {
        self.lock().reports.clone()
    }

    /// Number of roster lookups attempted.
    pub fn roster_calls(&self) -> u32 {
        self.lock().roster_calls
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        // A poisoned script only happens after a test already panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_reply(&self, channel: &ChannelRef) -> Option<ScriptedReply> {
        let participant = channel.as_str().strip_prefix(DM_PREFIX)?;
        self.lock().replies.get_mut(participant)?.pop_front()
    }

    fn next_message_ref(state: &mut ScriptState, channel: &ChannelRef) -> MessageRef {
        state.next_message_id += 1;
        MessageRef {
            channel: channel.clone(),
            id: format!("msg-{}", state.next_message_id),
        }
    }
}

/// DM channel name used for a participant.
pub fn dm_channel(participant_id: &str) -> ChannelRef {
    ChannelRef::new(format!("{DM_PREFIX}{participant_id}"))
}

async fn time_out(timeout: Duration) -> MessagingError {
    tokio::time::sleep(timeout).await;
    MessagingError::Timeout
}

#[async_trait]
impl MessagingPort for ScriptedMessenger {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn resolve_roster(&self) -> Result<Vec<Participant>, MessagingError> {
        let mut state = self.lock();
        state.roster_calls += 1;
        if state.roster_failures > 0 {
            state.roster_failures -= 1;
            return Err(MessagingError::Transport("roster unavailable".to_owned()));
        }
        Ok(state.roster.clone())
    }

    async fn verify_channel(&self, channel: &ChannelRef) -> Result<(), MessagingError> {
        if self.lock().report_channel_down {
            return Err(MessagingError::Transport(format!("channel {channel} not found")));
        }
        Ok(())
    }

    async fn open_direct_channel(&self, participant: &Participant) -> Result<ChannelRef, MessagingError> {
        if self.lock().unreachable.contains(&participant.id) {
            return Err(MessagingError::Unreachable(format!(
                "direct messages disabled for {}",
                participant.label
            )));
        }
        Ok(dm_channel(&participant.id))
    }

    async fn send_message(&self, channel: &ChannelRef, content: &str) -> Result<MessageRef, MessagingError> {
        let mut state = self.lock();
        if let Some(limit) = channel
            .as_str()
            .strip_prefix(DM_PREFIX)
            .and_then(|id| state.closes_after.get(id).copied())
        {
            let delivered = state.sent.iter().filter(|(c, _)| c == channel).count();
            if delivered >= limit {
                return Err(MessagingError::Unreachable(format!("direct messages closed on {channel}")));
            }
        }
        state.sent.push((channel.clone(), content.to_owned()));
        Ok(Self::next_message_ref(&mut state, channel))
    }

    async fn add_reaction(&self, message: &MessageRef, symbol: &str) -> Result<(), MessagingError> {
        self.lock()
            .reactions_added
            .push((message.clone(), symbol.to_owned()));
        Ok(())
    }

    async fn await_reply(
        &self,
        channel: &ChannelRef,
        filter: &ReplyFilter,
        timeout: Duration,
    ) -> Result<Reply, MessagingError> {
        let text = match self.next_reply(channel) {
            Some(ScriptedReply::Text(text)) => text,
            Some(ScriptedReply::Delayed { after, text }) if after <= timeout => {
                tokio::time::sleep(after).await;
                text
            }
            _ => return Err(time_out(timeout).await),
        };

        let message = {
            let mut state = self.lock();
            Self::next_message_ref(&mut state, channel)
        };
        Ok(Reply {
            message,
            author: filter.author.clone(),
            text,
            received_at: Instant::now(),
        })
    }

    async fn await_reaction(
        &self,
        message: &MessageRef,
        filter: &ReactionFilter,
        timeout: Duration,
    ) -> Result<Reaction, MessagingError> {
        match self.next_reply(&message.channel) {
            Some(ScriptedReply::Reaction(symbol)) if filter.allows(&symbol) => Ok(Reaction {
                symbol,
                user: filter.user.clone(),
                received_at: Instant::now(),
            }),
            _ => Err(time_out(timeout).await),
        }
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), MessagingError> {
        self.lock().deleted.push(message.clone());
        Ok(())
    }

    async fn publish_report(&self, _channel: &ChannelRef, report: &Report) -> Result<(), MessagingError> {
        let mut state = self.lock();
        if state.publish_failures > 0 {
            state.publish_failures -= 1;
            return Err(MessagingError::Transport("report channel rejected message".to_owned()));
        }
        state.reports.push(report.clone());
        Ok(())
    }
}
