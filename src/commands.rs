//! Text commands typed in chat.
//!
//! ```text
//! !comment <participant> <answer-index> <text>
//! !checkin now
//! !checkin next
//! !checkin help
//! ```

use crate::engine::CheckinEngine;
use crate::scheduler::TriggerOutcome;
use std::sync::Arc;
use tracing::warn;

const COMMAND_PREFIX: char = '!';
const COMMENT_USAGE: &str = "!comment <participant> <answer-index> <text>";
const HELP: &str = "Commands: `!comment <participant> <answer-index> <text>`, `!checkin now`, `!checkin next`";

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Attach a comment to a stored answer. `index` counts every answer the
    /// participant has ever given, oldest first, starting at 0.
    AddComment {
        participant: String,
        index: usize,
        text: String,
    },
    /// Run the campaign immediately.
    TriggerNow,
    /// Show upcoming fire times.
    NextFire,
    Help,
}

/// Why a `!` message was not understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse a chat message. Returns `None` for ordinary (non-command) text.
pub fn parse_command(text: &str) -> Option<Result<Command, CommandParseError>> {
    let body = text.trim().strip_prefix(COMMAND_PREFIX)?;
    let (name, rest) = split_word(body);
    if name.is_empty() {
        return None;
    }

    let parsed = match name.to_ascii_lowercase().as_str() {
        "comment" => parse_comment(rest),
        "checkin" => match split_word(rest).0.to_ascii_lowercase().as_str() {
            "now" => Ok(Command::TriggerNow),
            "next" | "status" => Ok(Command::NextFire),
            "help" | "" => Ok(Command::Help),
            other => Err(CommandParseError::Unknown(format!("checkin {other}"))),
        },
        _ => Err(CommandParseError::Unknown(name.to_owned())),
    };
    Some(parsed)
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(at) => (&text[..at], text[at..].trim_start()),
        None => (text, ""),
    }
}

fn parse_comment(args: &str) -> Result<Command, CommandParseError> {
    let (participant, rest) = split_word(args);
    let (index, text) = split_word(rest);
    let participant = strip_mention(participant);
    let index = index
        .parse::<usize>()
        .map_err(|_| CommandParseError::Usage(COMMENT_USAGE))?;
    let text = text.trim();
    if participant.is_empty() || text.is_empty() {
        return Err(CommandParseError::Usage(COMMENT_USAGE));
    }
    Ok(Command::AddComment {
        participant: participant.to_owned(),
        index,
        text: text.to_owned(),
    })
}

/// `<@123>` and `<@!123>` become `123`.
fn strip_mention(token: &str) -> &str {
    token
        .strip_prefix("<@")
        .and_then(|t| t.strip_suffix('>'))
        .map(|t| t.trim_start_matches('!'))
        .unwrap_or(token)
}

/// Routes commands to the engine and phrases the replies.
pub struct CommandDispatcher {
    engine: Arc<CheckinEngine>,
}

impl CommandDispatcher {
    pub fn new(engine: Arc<CheckinEngine>) -> Self {
        Self { engine }
    }

    /// Handle a raw chat message. `None` when it is not a command.
    pub async fn handle_text(&self, author: &str, text: &str) -> Option<String> {
        let reply = match parse_command(text)? {
            Ok(command) => self.dispatch(author, command).await,
            Err(e) => format!("{e}. {HELP}"),
        };
        Some(reply)
    }

    /// Run one command and return the reply text.
    pub async fn dispatch(&self, author: &str, command: Command) -> String {
        match command {
            Command::AddComment {
                participant,
                index,
                text,
            } => match self.engine.add_comment(&participant, index, author, &text) {
                Ok(()) => format!("Comment added to answer {index} of {participant}."),
                Err(e) => {
                    warn!(author, "comment rejected: {e}");
                    format!("Could not add comment: {e}")
                }
            },
            Command::TriggerNow => match self.engine.trigger_now().await {
                Ok(TriggerOutcome::Completed) => match self.engine.last_report() {
                    Some(report) => format!("Check-in finished: {report}"),
                    None => "Check-in run ended without a report; see the logs.".to_owned(),
                },
                Ok(TriggerOutcome::AlreadyRunning) => "A check-in is already running.".to_owned(),
                Ok(TriggerOutcome::Cancelled) => "The scheduler is shutting down.".to_owned(),
                Err(e) => format!("Could not start a check-in: {e}"),
            },
            Command::NextFire => {
                let jobs = self.engine.next_fire_times();
                if jobs.is_empty() {
                    return "Nothing is scheduled.".to_owned();
                }
                jobs.iter()
                    .map(|job| match job.next_fire {
                        Some(at) => format!("{} ({}): next at {}", job.name, job.rule, at.to_rfc3339()),
                        None => format!("{} ({}): not scheduled", job.name, job.rule),
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Command::Help => HELP.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::campaign::Prompt;
    use crate::config::RollcallConfig;
    use crate::messaging::Participant;
    use crate::messaging::scripted::{ScriptedMessenger, ScriptedReply};
    use crate::store::ResponseStore;
    use std::time::Duration;

    #[test]
    fn ordinary_text_is_not_a_command() {
        assert_eq!(parse_command("shipped the release"), None);
        assert_eq!(parse_command("!"), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn parses_comment_with_mention_and_spaces() {
        let parsed = parse_command("!comment <@!42> 3 great progress,  keep going").unwrap();
        assert_eq!(
            parsed,
            Ok(Command::AddComment {
                participant: "42".to_owned(),
                index: 3,
                text: "great progress,  keep going".to_owned(),
            })
        );
    }

    #[test]
    fn malformed_comment_reports_usage() {
        assert_eq!(
            parse_command("!comment 42 first nice"),
            Some(Err(CommandParseError::Usage(COMMENT_USAGE)))
        );
        assert_eq!(
            parse_command("!comment 42 1"),
            Some(Err(CommandParseError::Usage(COMMENT_USAGE)))
        );
    }

    #[test]
    fn parses_checkin_subcommands() {
        assert_eq!(parse_command("!checkin now"), Some(Ok(Command::TriggerNow)));
        assert_eq!(parse_command("!CHECKIN Next"), Some(Ok(Command::NextFire)));
        assert_eq!(parse_command("!checkin"), Some(Ok(Command::Help)));
        assert!(matches!(parse_command("!checkin later"), Some(Err(CommandParseError::Unknown(_)))));
        assert_eq!(
            parse_command("!dance"),
            Some(Err(CommandParseError::Unknown("dance".to_owned())))
        );
    }

    fn dispatcher(port: Arc<ScriptedMessenger>) -> (CommandDispatcher, Arc<CheckinEngine>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ResponseStore::open(dir.path().join("responses.json")).unwrap());
        let mut config = RollcallConfig::default();
        config.channels.roster_channel_id = "roster".to_owned();
        config.channels.report_channel_id = "reports".to_owned();
        config.campaign.pacing_secs = 0;
        config.campaign.prompts =
            vec![Prompt::new("today", "What are you working on today?").with_timeout(Duration::from_secs(30))];
        let engine = Arc::new(CheckinEngine::new(config, port, store).unwrap());
        (CommandDispatcher::new(Arc::clone(&engine)), engine, dir)
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_then_comment_through_chat() {
        let port = Arc::new(
            ScriptedMessenger::new().with_participant(Participant::new("42", "ana"), vec![ScriptedReply::text("docs")]),
        );
        let (dispatcher, engine, _dir) = dispatcher(port);
        engine.start().unwrap();

        let reply = dispatcher.handle_text("lead", "!checkin now").await.unwrap();
        assert!(reply.starts_with("Check-in finished"), "{reply}");

        let reply = dispatcher.handle_text("lead", "!comment <@42> 0 well done").await.unwrap();
        assert_eq!(reply, "Comment added to answer 0 of 42.");
        let reply = dispatcher.handle_text("lead", "!comment 42 9 too far").await.unwrap();
        assert!(reply.starts_with("Could not add comment"), "{reply}");

        let reply = dispatcher.handle_text("lead", "!checkin next").await.unwrap();
        assert!(reply.contains("check-in campaign (Mon-Fri at 08:00 America/Los_Angeles): next at"));

        assert!(dispatcher.handle_text("lead", "just chatting").await.is_none());
        let reply = dispatcher.handle_text("lead", "!nope").await.unwrap();
        assert!(reply.starts_with("unknown command `nope`"));
    }
}
