use crate::campaign::Report;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// A roster member as reported by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Platform user id; also the response store key.
    pub id: String,
    /// Display label for reports and logs.
    pub label: String,
    /// Automated/system account. Never checked in.
    pub is_bot: bool,
}

impl Participant {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            is_bot: false,
        }
    }

    pub fn bot(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            is_bot: true,
            ..Self::new(id, label)
        }
    }
}

/// Opaque reference to a channel (guild text channel or direct message).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelRef(pub String);

impl ChannelRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message the bot sent or received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub channel: ChannelRef,
    pub id: String,
}

/// Restricts which inbound messages count as a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFilter {
    /// Only messages authored by this user.
    pub author: String,
}

/// Restricts which reactions count as an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionFilter {
    /// Only reactions added by this user.
    pub user: String,
    /// Only these symbols.
    pub allowed: Vec<String>,
}

impl ReactionFilter {
    #[must_use]
    pub fn allows(&self, symbol: &str) -> bool {
        self.allowed.iter().any(|s| s == symbol)
    }
}

/// A collected text reply.
#[derive(Debug, Clone)]
pub struct Reply {
    pub message: MessageRef,
    pub author: String,
    pub text: String,
    /// When the transport received the message.
    pub received_at: Instant,
}

/// A collected reaction.
#[derive(Debug, Clone)]
pub struct Reaction {
    pub symbol: String,
    pub user: String,
    /// When the transport received the reaction.
    pub received_at: Instant,
}

/// Messaging failure classes the engine branches on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessagingError {
    /// The target cannot be messaged at all (e.g. DMs disabled).
    #[error("unreachable: {0}")]
    Unreachable(String),
    /// Nothing matching arrived in time.
    #[error("timed out")]
    Timeout,
    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Chat platform contract consumed by the engine. New platforms only need
/// to implement this trait.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Stable platform identifier (e.g. `discord`).
    fn id(&self) -> &'static str;

    /// Current roster snapshot.
    async fn resolve_roster(&self) -> Result<Vec<Participant>, MessagingError>;

    /// Confirm a channel exists and is usable.
    async fn verify_channel(&self, channel: &ChannelRef) -> Result<(), MessagingError>;

    /// Open (or reuse) a private channel to `participant`.
    async fn open_direct_channel(&self, participant: &Participant) -> Result<ChannelRef, MessagingError>;

    /// Send plain text.
    async fn send_message(&self, channel: &ChannelRef, content: &str) -> Result<MessageRef, MessagingError>;

    /// Add the bot's own reaction to a message.
    async fn add_reaction(&self, message: &MessageRef, symbol: &str) -> Result<(), MessagingError>;

    /// Wait for one reply on `channel` that passes `filter`.
    async fn await_reply(
        &self,
        channel: &ChannelRef,
        filter: &ReplyFilter,
        timeout: Duration,
    ) -> Result<Reply, MessagingError>;

    /// Wait for one reaction on `message` that passes `filter`.
    async fn await_reaction(
        &self,
        message: &MessageRef,
        filter: &ReactionFilter,
        timeout: Duration,
    ) -> Result<Reaction, MessagingError>;

    /// Delete a message.
    async fn delete_message(&self, message: &MessageRef) -> Result<(), MessagingError>;

    /// Publish a finished campaign report.
    async fn publish_report(&self, channel: &ChannelRef, report: &Report) -> Result<(), MessagingError>;
}
