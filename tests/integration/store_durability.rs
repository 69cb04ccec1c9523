//! Answers survive a restart and corrupt files are handled.

use crate::helpers::{daily_prompts, runner, temp_store};
use rollcall::messaging::Participant;
use rollcall::messaging::scripted::{ScriptedMessenger, ScriptedReply};
use rollcall::store::{Comment, ResponseStore};
use rollcall::CheckinError;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn answers_are_on_disk_after_a_run() {
    let (store, _dir) = temp_store();
    let port = Arc::new(ScriptedMessenger::new().with_participant(
        Participant::new("a", "ana"),
        vec![ScriptedReply::text("one"), ScriptedReply::text("two"), ScriptedReply::text("three")],
    ));

    let report = runner(&port, &store, daily_prompts(Duration::from_secs(30)))
        .run()
        .await
        .unwrap();
    store.add_comment("a", 1, Comment::new("lead", "ping me")).unwrap();

    let reopened = ResponseStore::open(store.path()).unwrap();
    let record = reopened.record("a").unwrap().unwrap();
    assert_eq!(record.answers.len(), 3);
    assert_eq!(record.answers_for_run(report.run_id).len(), 3);
    assert_eq!(record.answers[1].comments[0].text, "ping me");
    assert_eq!(record.answers[2].prompt, "What are your goals for tomorrow?");
}

#[tokio::test(start_paused = true)]
async fn repeated_runs_append_without_deduplicating() {
    let (store, _dir) = temp_store();
    let port = Arc::new(
        ScriptedMessenger::new().with_participant(Participant::new("a", "ana"), vec![ScriptedReply::text("same")]),
    );
    let runner = runner(&port, &store, daily_prompts(Duration::from_secs(10)));

    runner.run().await.unwrap();
    port.push_replies("a", vec![ScriptedReply::text("same")]);
    runner.run().await.unwrap();

    let record = ResponseStore::open(store.path()).unwrap().record("a").unwrap().unwrap();
    assert_eq!(record.answers.len(), 6);
    assert_eq!(record.answers[0].value, record.answers[3].value);
    assert_ne!(record.answers[0].run_id, record.answers[3].run_id);
}

#[test]
fn corrupt_file_is_refused_then_moved_aside() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("responses.json");
    std::fs::write(&path, b"{ not json").unwrap();

    assert!(matches!(ResponseStore::open(&path), Err(CheckinError::CorruptStore(_))));

    let store = ResponseStore::open_or_recover(&path).unwrap();
    assert!(store.snapshot().unwrap().is_empty());
    let aside: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
        .collect();
    assert_eq!(aside.len(), 1);
}
