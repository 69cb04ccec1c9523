//! Campaign runner and batch retry controller.
//!
//! One run walks the roster sequentially, isolating every participant's
//! conversation on its own task, then publishes a single report.

use crate::campaign::conversation::{Conversation, ConversationContext, ConversationOutcome};
use crate::campaign::prompt::Prompt;
use crate::campaign::report::{ParticipantOutcome, Report, ReportEntry};
use crate::error::{CheckinError, Result};
use crate::messaging::{ChannelRef, MessagingPort, Participant};
use crate::retry::{RetryPolicy, run_with_retry};
use crate::store::ResponseStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Per-campaign runtime settings.
#[derive(Debug, Clone)]
pub struct CampaignSettings {
    /// Where the report is published.
    pub report_channel: ChannelRef,
    /// Pause between participants.
    pub pacing: Duration,
    /// Delete collected replies after recording them.
    pub cleanup_replies: bool,
}

/// Runs one campaign over the current roster.
pub struct CampaignRunner {
    port: Arc<dyn MessagingPort>,
    store: Arc<ResponseStore>,
    prompts: Arc<[Prompt]>,
    settings: CampaignSettings,
}

impl CampaignRunner {
    pub fn new(
        port: Arc<dyn MessagingPort>,
        store: Arc<ResponseStore>,
        prompts: Vec<Prompt>,
        settings: CampaignSettings,
    ) -> Self {
        Self {
            port,
            store,
            prompts: prompts.into(),
            settings,
        }
    }

    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    /// Resolve the roster and run the campaign over it.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::BatchFailure`] when the report channel or the
    /// roster is unusable, or when the report cannot be published, and
    /// [`CheckinError::StoreUnavailable`] when answers cannot be saved.
    /// Participant-level failures never surface here.
    pub async fn run(&self) -> Result<Report> {
        self.port
            .verify_channel(&self.settings.report_channel)
            .await
            .map_err(|e| {
                CheckinError::BatchFailure(format!(
                    "report channel {} unusable: {e}",
                    self.settings.report_channel
                ))
            })?;

        let roster = self
            .port
            .resolve_roster()
            .await
            .map_err(|e| CheckinError::BatchFailure(format!("cannot resolve roster: {e}")))?;

        self.run_roster(roster).await
    }

    /// Run the campaign over an explicit roster snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::BatchFailure`] if the report cannot be
    /// published, or the storage error that stopped the run early. No report
    /// is published in that case.
    pub async fn run_roster(&self, roster: Vec<Participant>) -> Result<Report> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            %run_id,
            roster = roster.len(),
            prompts = self.prompts.len(),
            "check-in campaign started"
        );

        let ctx = ConversationContext {
            port: Arc::clone(&self.port),
            store: Arc::clone(&self.store),
            prompts: Arc::clone(&self.prompts),
            run_id,
            cleanup_replies: self.settings.cleanup_replies,
        };

        let mut entries = Vec::with_capacity(roster.len());
        for participant in roster {
            if participant.is_bot {
                debug!(participant = %participant.id, "skipping automated account");
                continue;
            }
            if !entries.is_empty() && !self.settings.pacing.is_zero() {
                tokio::time::sleep(self.settings.pacing).await;
            }

            let outcome = run_isolated(ctx.clone(), participant.clone()).await?;
            entries.push(ReportEntry {
                participant,
                outcome,
            });
        }

        let report = Report {
            run_id,
            started_at,
            finished_at: Utc::now(),
            entries,
        };

        self.port
            .publish_report(&self.settings.report_channel, &report)
            .await
            .map_err(|e| CheckinError::BatchFailure(format!("cannot publish report: {e}")))?;

        info!("check-in campaign finished: {report}");
        Ok(report)
    }
}

/// Run one conversation on its own task so nothing it does, a panic
/// included, can stop the roster loop. Storage failures are the exception:
/// they are returned so the run stops before more answers are lost.
async fn run_isolated(ctx: ConversationContext, participant: Participant) -> Result<ParticipantOutcome> {
    let id = participant.id.clone();
    let task = tokio::spawn(Conversation::new(ctx, participant).run());
    let outcome = match task.await {
        Ok(Ok(ConversationOutcome::Completed(answers))) => ParticipantOutcome::Answered(answers),
        Ok(Ok(ConversationOutcome::Aborted { reason, answers })) => {
            ParticipantOutcome::Unreachable { reason, answers }
        }
        Ok(Err(e)) if e.is_storage() => {
            error!(participant = %id, "response store failed, stopping the run: {e}");
            return Err(e);
        }
        Ok(Err(e)) => {
            error!(participant = %id, "check-in failed: {e}");
            ParticipantOutcome::Failed {
                reason: e.to_string(),
            }
        }
        Err(join_err) => {
            error!(participant = %id, "check-in task crashed: {join_err}");
            ParticipantOutcome::Failed {
                reason: format!("conversation task crashed: {join_err}"),
            }
        }
    };
    Ok(outcome)
}

/// Run `runner` under `policy`, retrying whole-batch failures.
///
/// # Errors
///
/// Returns the final error once attempts are exhausted.
pub async fn run_campaign_with_retry(runner: &CampaignRunner, policy: &RetryPolicy) -> Result<Report> {
    run_with_retry(policy, "check-in campaign", move |attempt| {
        if attempt > 1 {
            warn!("starting check-in campaign attempt {attempt}");
        }
        runner.run()
    })
    .await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::messaging::scripted::{ScriptedMessenger, ScriptedReply};
    use crate::store::AnswerValue;

    fn settings(pacing: Duration) -> CampaignSettings {
        CampaignSettings {
            report_channel: ChannelRef::new("reports"),
            pacing,
            cleanup_replies: false,
        }
    }

    fn prompts() -> Vec<Prompt> {
        vec![
            Prompt::new("done", "What did you accomplish today?").with_timeout(Duration::from_secs(60)),
            Prompt::new("next", "What are your goals for tomorrow?").with_timeout(Duration::from_secs(60)),
        ]
    }

    fn runner_with(port: Arc<ScriptedMessenger>, pacing: Duration) -> (CampaignRunner, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ResponseStore::open(dir.path().join("responses.json")).unwrap());
        (CampaignRunner::new(port, store, prompts(), settings(pacing)), dir)
    }

    fn replies(a: &str, b: &str) -> Vec<ScriptedReply> {
        vec![ScriptedReply::text(a), ScriptedReply::text(b)]
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_participant_is_isolated() {
        let port = Arc::new(
            ScriptedMessenger::new()
                .with_participant(Participant::new("1", "one"), replies("a", "b"))
                .with_unreachable(Participant::new("2", "two"))
                .with_participant(Participant::new("3", "three"), replies("c", "d")),
        );
        let (runner, _dir) = runner_with(Arc::clone(&port), Duration::ZERO);

        let report = runner.run().await.unwrap();
        assert_eq!(report.len(), 3);
        assert_eq!(report.answers("1").unwrap().len(), 2);
        assert_eq!(report.answers("3").unwrap()[1].value, AnswerValue::Text("d".to_owned()));
        assert!(matches!(
            report.get("2").unwrap().outcome,
            ParticipantOutcome::Unreachable { .. }
        ));
        assert_eq!(port.reports().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn broken_store_stops_the_run_before_anyone_else_is_asked() {
        let port = Arc::new(
            ScriptedMessenger::new()
                .with_participant(Participant::new("1", "one"), replies("a", "b"))
                .with_participant(Participant::new("2", "two"), replies("c", "d"))
                .with_participant(Participant::new("3", "three"), replies("e", "f")),
        );
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ResponseStore::open(dir.path().join("blocker").join("r.json")).unwrap());
        // A plain file where the store directory should be makes every write fail.
        std::fs::write(dir.path().join("blocker"), b"").unwrap();
        let runner = CampaignRunner::new(Arc::clone(&port) as _, store, prompts(), settings(Duration::ZERO));

        let result = run_campaign_with_retry(&runner, &RetryPolicy::fixed(3, Duration::from_secs(30))).await;

        assert!(matches!(result, Err(CheckinError::StoreUnavailable(_))));
        assert_eq!(port.roster_calls(), 1);
        assert_eq!(port.sent().len(), 1);
        assert!(port.sent_to("2").is_empty());
        assert!(port.reports().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dms_closing_mid_run_keep_the_earlier_answer() {
        let port = Arc::new(
            ScriptedMessenger::new()
                .with_participant(Participant::new("1", "one"), replies("a", "b"))
                .with_dm_closed_after("1", 1),
        );
        let (runner, _dir) = runner_with(Arc::clone(&port), Duration::ZERO);

        let report = runner.run().await.unwrap();
        let ParticipantOutcome::Unreachable { reason, answers } = &report.get("1").unwrap().outcome else {
            panic!("expected unreachable");
        };
        assert!(reason.contains("closed"));
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].value, AnswerValue::Text("a".to_owned()));
        assert!(answers[1].value.is_no_response());
        assert_eq!(report.unreachable_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bots_are_skipped() {
        let port = Arc::new(
            ScriptedMessenger::new()
                .with_participant(Participant::bot("b", "robot"), vec![])
                .with_participant(Participant::new("1", "one"), replies("a", "b")),
        );
        let (runner, _dir) = runner_with(Arc::clone(&port), Duration::ZERO);

        let report = runner.run().await.unwrap();
        assert_eq!(report.len(), 1);
        assert!(report.get("b").is_none());
        assert!(port.sent_to("b").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_applies_between_participants_only() {
        let port = Arc::new(
            ScriptedMessenger::new()
                .with_participant(Participant::new("1", "one"), replies("a", "b"))
                .with_participant(Participant::new("2", "two"), replies("c", "d"))
                .with_participant(Participant::new("3", "three"), replies("e", "f")),
        );
        let (runner, _dir) = runner_with(port, Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        runner.run().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn dead_report_channel_fails_before_anyone_is_asked() {
        let port = Arc::new(
            ScriptedMessenger::new()
                .with_participant(Participant::new("1", "one"), replies("a", "b"))
                .with_report_channel_down(),
        );
        let (runner, _dir) = runner_with(Arc::clone(&port), Duration::ZERO);

        let result = runner.run().await;
        assert!(matches!(result, Err(CheckinError::BatchFailure(_))));
        assert!(port.sent().is_empty());
        assert_eq!(port.roster_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failure_is_a_batch_failure() {
        let port = Arc::new(
            ScriptedMessenger::new()
                .with_participant(Participant::new("1", "one"), replies("a", "b"))
                .with_publish_failures(1),
        );
        let (runner, _dir) = runner_with(port, Duration::ZERO);
        assert!(matches!(runner.run().await, Err(CheckinError::BatchFailure(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_controller_returns_third_attempt_report() {
        let port = Arc::new(
            ScriptedMessenger::new()
                .with_participant(Participant::new("1", "one"), replies("a", "b"))
                .with_roster_failures(2),
        );
        let (runner, _dir) = runner_with(Arc::clone(&port), Duration::ZERO);
        let policy = RetryPolicy::fixed(3, Duration::from_secs(30));

        let report = run_campaign_with_retry(&runner, &policy).await.unwrap();
        assert_eq!(port.roster_calls(), 3);
        assert_eq!(port.reports().len(), 1);
        assert_eq!(port.reports()[0].run_id, report.run_id);
        assert_eq!(report.answered_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_controller_gives_up() {
        let port = Arc::new(
            ScriptedMessenger::new()
                .with_participant(Participant::new("1", "one"), replies("a", "b"))
                .with_roster_failures(5),
        );
        let (runner, _dir) = runner_with(Arc::clone(&port), Duration::ZERO);
        let policy = RetryPolicy::fixed(3, Duration::from_secs(30));

        let result = run_campaign_with_retry(&runner, &policy).await;
        assert!(matches!(result, Err(CheckinError::BatchFailure(_))));
        assert_eq!(port.roster_calls(), 3);
        assert!(port.reports().is_empty());
    }
}
