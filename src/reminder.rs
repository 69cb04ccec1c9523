//! One-shot reminder posted to a shared channel.

use crate::error::CheckinError;
use crate::messaging::{ChannelRef, MessagingPort};
use crate::retry::{RetryPolicy, run_with_retry};
use std::sync::Arc;
use tracing::{error, info};

/// The message the deployed bot posted every morning.
pub const DEFAULT_REMINDER_TEXT: &str = "**Daily Check-in!** 👋 Please react to this message or say 'here' to indicate you're present and ready to code today!";

/// Posts the reminder with bounded retry.
pub struct ReminderSender {
    port: Arc<dyn MessagingPort>,
    channel: ChannelRef,
    text: String,
    policy: RetryPolicy,
}

impl ReminderSender {
    pub fn new(
        port: Arc<dyn MessagingPort>,
        channel: ChannelRef,
        text: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            port,
            channel,
            text: text.into(),
            policy,
        }
    }

    pub fn channel(&self) -> &ChannelRef {
        &self.channel
    }

    /// Post the reminder. Failures are logged, never returned.
    ///
    /// Returns `true` when the message was delivered.
    pub async fn send(&self) -> bool {
        let (port, channel, text) = (&self.port, &self.channel, self.text.as_str());
        let result = run_with_retry(&self.policy, "daily reminder", move |_| async move {
            port.send_message(channel, text)
                .await
                .map_err(|e| CheckinError::Messaging(format!("reminder to {channel}: {e}")))
        })
        .await;

        match result {
            Ok(message) => {
                info!(channel = %self.channel, message = %message.id, "daily reminder posted");
                true
            }
            Err(e) => {
                error!(channel = %self.channel, "daily reminder not delivered: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::campaign::Report;
    use crate::messaging::{
        MessageRef, MessagingError, Participant, Reaction, ReactionFilter, Reply, ReplyFilter,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Port whose sends fail a fixed number of times.
    struct FlakyPort {
        failures_left: Mutex<u32>,
        attempts: Mutex<u32>,
    }

    impl FlakyPort {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: Mutex::new(failures),
                attempts: Mutex::new(0),
            }
        }

        fn attempts(&self) -> u32 {
            *self.attempts.lock().unwrap()
        }
    }

    #[async_trait]
    impl MessagingPort for FlakyPort {
        fn id(&self) -> &'static str {
            "flaky"
        }
        async fn resolve_roster(&self) -> Result<Vec<Participant>, MessagingError> {
            Ok(Vec::new())
        }
        async fn verify_channel(&self, _: &ChannelRef) -> Result<(), MessagingError> {
            Ok(())
        }
        async fn open_direct_channel(&self, p: &Participant) -> Result<ChannelRef, MessagingError> {
            Ok(ChannelRef::new(p.id.clone()))
        }
        async fn send_message(&self, channel: &ChannelRef, _: &str) -> Result<MessageRef, MessagingError> {
            *self.attempts.lock().unwrap() += 1;
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(MessagingError::Transport("503".to_owned()));
            }
            Ok(MessageRef {
                channel: channel.clone(),
                id: "m1".to_owned(),
            })
        }
        async fn add_reaction(&self, _: &MessageRef, _: &str) -> Result<(), MessagingError> {
            Ok(())
        }
        async fn await_reply(&self, _: &ChannelRef, _: &ReplyFilter, _: Duration) -> Result<Reply, MessagingError> {
            Err(MessagingError::Timeout)
        }
        async fn await_reaction(
            &self,
            _: &MessageRef,
            _: &ReactionFilter,
            _: Duration,
        ) -> Result<Reaction, MessagingError> {
            Err(MessagingError::Timeout)
        }
        async fn delete_message(&self, _: &MessageRef) -> Result<(), MessagingError> {
            Ok(())
        }
        async fn publish_report(&self, _: &ChannelRef, _: &Report) -> Result<(), MessagingError> {
            Ok(())
        }
    }

    fn sender(port: Arc<FlakyPort>, attempts: u32) -> ReminderSender {
        ReminderSender::new(
            port,
            ChannelRef::new("general"),
            DEFAULT_REMINDER_TEXT,
            RetryPolicy::fixed(attempts, Duration::from_secs(10)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_delivered() {
        let port = Arc::new(FlakyPort::new(2));
        assert!(sender(Arc::clone(&port), 3).send().await);
        assert_eq!(port.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_quietly_after_exhausting_attempts() {
        let port = Arc::new(FlakyPort::new(10));
        assert!(!sender(Arc::clone(&port), 2).send().await);
        assert_eq!(port.attempts(), 2);
    }
}
