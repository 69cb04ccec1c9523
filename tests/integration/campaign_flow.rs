//! End-to-end campaign runs against the scripted messenger.

use crate::helpers::{daily_prompts, runner, temp_store, templated_prompts};
use rollcall::campaign::{ParticipantOutcome, run_campaign_with_retry};
use rollcall::messaging::Participant;
use rollcall::messaging::scripted::{ScriptedMessenger, ScriptedReply};
use rollcall::retry::RetryPolicy;
use rollcall::store::AnswerValue;
use rollcall::CheckinError;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn one_participant_failing_does_not_stop_the_others() {
    let (store, _dir) = temp_store();
    let port = Arc::new(
        ScriptedMessenger::new()
            .with_participant(
                Participant::new("a", "ana"),
                vec![
                    ScriptedReply::text("Shipped the importer"),
                    ScriptedReply::text("Flaky CI"),
                    ScriptedReply::text("Review PRs"),
                ],
            )
            .with_unreachable(Participant::new("b", "ben"))
            .with_participant(Participant::new("c", "cleo"), vec![ScriptedReply::text("Pairing")]),
    );

    let report = runner(&port, &store, daily_prompts(Duration::from_secs(60)))
        .run()
        .await
        .unwrap();

    assert_eq!(report.len(), 3);
    assert_eq!(report.answered_count(), 2);
    assert_eq!(report.unreachable_count(), 1);
    let order: Vec<&str> = report.entries.iter().map(|e| e.participant.id.as_str()).collect();
    assert_eq!(order, ["a", "b", "c"]);

    let ana: Vec<String> = report.answers("a").unwrap().iter().map(|a| a.value.to_string()).collect();
    assert_eq!(ana, ["Shipped the importer", "Flaky CI", "Review PRs"]);

    let cleo = report.answers("c").unwrap();
    assert_eq!(cleo[0].value, AnswerValue::Text("Pairing".to_owned()));
    assert!(cleo[1].value.is_no_response());
    assert!(cleo[2].value.is_no_response());

    assert!(matches!(
        report.get("b").unwrap().outcome,
        ParticipantOutcome::Unreachable { .. }
    ));
    let ben = store.record("b").unwrap().unwrap();
    assert_eq!(ben.answers.len(), 3);
    assert!(ben.answers.iter().all(|a| a.value.is_no_response()));

    assert_eq!(port.reports().len(), 1);
    assert!(port.sent_to("b").is_empty());
}

#[tokio::test(start_paused = true)]
async fn follow_up_quotes_the_previous_run() {
    let (store, _dir) = temp_store();
    let port = Arc::new(ScriptedMessenger::new().with_participant(
        Participant::new("a", "ana"),
        vec![ScriptedReply::text("ok"), ScriptedReply::text("Fix the login bug")],
    ));
    let runner = runner(&port, &store, templated_prompts());

    runner.run().await.unwrap();
    let first = port.sent_to("a");
    assert_eq!(first[0], "How did yesterday's work on \"your previous goals\" go?");

    port.push_replies("a", vec![ScriptedReply::text("Done"), ScriptedReply::text("Write tests")]);
    runner.run().await.unwrap();
    let second = port.sent_to("a");
    assert_eq!(second.len(), 4);
    assert_eq!(second[2], "How did yesterday's work on \"Fix the login bug\" go?");
}

#[tokio::test(start_paused = true)]
async fn unanswered_prior_falls_back_to_default_text() {
    let (store, _dir) = temp_store();
    let port = Arc::new(
        ScriptedMessenger::new().with_participant(Participant::new("a", "ana"), vec![ScriptedReply::Silent]),
    );
    let runner = runner(&port, &store, templated_prompts());

    runner.run().await.unwrap();
    port.push_replies("a", vec![ScriptedReply::text("fine"), ScriptedReply::text("Docs")]);
    runner.run().await.unwrap();

    let sent = port.sent_to("a");
    assert_eq!(sent[2], "How did yesterday's work on \"your previous goals\" go?");
}

#[tokio::test(start_paused = true)]
async fn reply_exactly_at_the_deadline_is_no_response() {
    let (store, _dir) = temp_store();
    let timeout = Duration::from_secs(60);
    let port = Arc::new(ScriptedMessenger::new().with_participant(
        Participant::new("a", "ana"),
        vec![
            ScriptedReply::Delayed {
                after: timeout,
                text: "too late".to_owned(),
            },
            ScriptedReply::Delayed {
                after: timeout - Duration::from_secs(1),
                text: "just in time".to_owned(),
            },
        ],
    ));

    let report = runner(&port, &store, daily_prompts(timeout)).run().await.unwrap();
    let answers = report.answers("a").unwrap();
    assert!(answers[0].value.is_no_response());
    assert_eq!(answers[1].value, AnswerValue::Text("just in time".to_owned()));
    assert!(answers[2].value.is_no_response());
}

#[tokio::test(start_paused = true)]
async fn batch_retry_succeeds_on_third_attempt() {
    let (store, _dir) = temp_store();
    let port = Arc::new(
        ScriptedMessenger::new()
            .with_participant(Participant::new("a", "ana"), vec![ScriptedReply::text("done")])
            .with_roster_failures(2),
    );
    let runner = runner(&port, &store, daily_prompts(Duration::from_secs(5)));
    let policy = RetryPolicy::fixed(3, Duration::from_secs(60));

    let started = tokio::time::Instant::now();
    let report = run_campaign_with_retry(&runner, &policy).await.unwrap();

    assert_eq!(port.roster_calls(), 3);
    assert_eq!(report.answered_count(), 1);
    assert!(started.elapsed() >= Duration::from_secs(120));
    assert_eq!(port.reports().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_the_batch_failure() {
    let (store, _dir) = temp_store();
    let port = Arc::new(ScriptedMessenger::new().with_report_channel_down());
    let runner = runner(&port, &store, daily_prompts(Duration::from_secs(5)));

    let result = run_campaign_with_retry(&runner, &RetryPolicy::fixed(2, Duration::from_secs(10))).await;

    assert!(matches!(result, Err(CheckinError::BatchFailure(_))));
    assert_eq!(port.roster_calls(), 0);
    assert!(port.reports().is_empty());
}
