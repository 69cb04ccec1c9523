//! Chat platform boundary.
//!
//! The engine only talks to [`MessagingPort`]. [`discord::DiscordAdapter`]
//! is the production implementation; [`scripted::ScriptedMessenger`] is an
//! in-memory double for tests and dry runs.

pub mod discord;
pub mod scripted;
pub mod traits;

pub use traits::{
    ChannelRef, MessageRef, MessagingError, MessagingPort, Participant, Reaction, ReactionFilter,
    Reply, ReplyFilter,
};
