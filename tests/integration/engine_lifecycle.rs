//! Engine wiring: scheduling, manual triggers and chat commands.

use crate::helpers::{engine_config, temp_store};
use rollcall::commands::CommandDispatcher;
use rollcall::engine::{CAMPAIGN_JOB, REMINDER_JOB};
use rollcall::messaging::Participant;
use rollcall::messaging::scripted::{ScriptedMessenger, ScriptedReply};
use rollcall::scheduler::{CalendarRule, TriggerOutcome};
use rollcall::CheckinEngine;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn manual_trigger_and_comment_round_through_the_store() {
    let (store, _dir) = temp_store();
    let port = Arc::new(ScriptedMessenger::new().with_participant(
        Participant::new("7", "ana"),
        vec![ScriptedReply::text("API docs"), ScriptedReply::text("none"), ScriptedReply::text("tests")],
    ));
    let engine = Arc::new(CheckinEngine::new(engine_config(), port.clone(), Arc::clone(&store)).unwrap());
    engine.start().unwrap();
    let dispatcher = CommandDispatcher::new(Arc::clone(&engine));

    let reply = dispatcher.handle_text("lead", "!checkin now").await.unwrap();
    assert!(reply.contains("1 answered"), "{reply}");
    assert_eq!(port.reports().len(), 1);

    let reply = dispatcher.handle_text("lead", "!comment <@7> 2 sounds good").await.unwrap();
    assert_eq!(reply, "Comment added to answer 2 of 7.");
    let record = store.record("7").unwrap().unwrap();
    assert_eq!(record.answers[2].comments[0].author, "lead");

    engine.shutdown();
    assert_eq!(engine.trigger_now().await.unwrap(), TriggerOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn both_jobs_report_their_next_fire() {
    let (store, _dir) = temp_store();
    let engine = CheckinEngine::new(engine_config(), Arc::new(ScriptedMessenger::new()), store).unwrap();
    engine.start().unwrap();

    let jobs = engine.next_fire_times();
    let names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, [CAMPAIGN_JOB, REMINDER_JOB]);
    assert!(jobs.iter().all(|j| j.next_fire.is_some()));
    assert_eq!(jobs[1].rule, "daily at 09:00 America/Los_Angeles");
}

#[tokio::test(start_paused = true)]
async fn timed_reminder_posts_to_the_shared_channel() {
    let (store, _dir) = temp_store();
    let mut config = engine_config();
    config.reminder.schedule = CalendarRule::daily(0, 0, "UTC");
    config.campaign.schedule = CalendarRule::daily(12, 0, "UTC");
    let port = Arc::new(ScriptedMessenger::new());
    let engine = CheckinEngine::new(config, port.clone(), store).unwrap();
    engine.start().unwrap();

    tokio::time::sleep(Duration::from_secs(25 * 3600)).await;

    let reminders: Vec<_> = port
        .sent()
        .into_iter()
        .filter(|(channel, _)| channel.as_str() == "general")
        .collect();
    assert!(!reminders.is_empty());
    assert!(reminders[0].1.starts_with("**Daily Check-in!**"));
    engine.shutdown();
}
