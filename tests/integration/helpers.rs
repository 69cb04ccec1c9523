//! Shared helpers for integration tests.

use rollcall::campaign::{CampaignRunner, CampaignSettings, Prompt};
use rollcall::config::RollcallConfig;
use rollcall::messaging::ChannelRef;
use rollcall::messaging::scripted::ScriptedMessenger;
use rollcall::store::ResponseStore;
use std::sync::Arc;
use std::time::Duration;

/// Store backed by a fresh temp dir. Keep the dir alive for the test.
pub(crate) fn temp_store() -> (Arc<ResponseStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = ResponseStore::open(dir.path().join("responses.json")).expect("open store");
    (Arc::new(store), dir)
}

/// A follow-up prompt that quotes yesterday's "today" answer, then the
/// "today" prompt itself.
pub(crate) fn templated_prompts() -> Vec<Prompt> {
    vec![
        Prompt::new("follow_up", "How did yesterday's work on \"{answer:today}\" go?")
            .with_timeout(Duration::from_secs(300)),
        Prompt::new("today", "What are you working on today?").with_timeout(Duration::from_secs(300)),
    ]
}

/// The three questions the deployed bot asked, with a short timeout.
pub(crate) fn daily_prompts(timeout: Duration) -> Vec<Prompt> {
    vec![
        Prompt::new("accomplished", "What did you accomplish today?").with_timeout(timeout),
        Prompt::new("challenges", "What challenges did you face?").with_timeout(timeout),
        Prompt::new("goals", "What are your goals for tomorrow?").with_timeout(timeout),
    ]
}

pub(crate) fn runner(
    port: &Arc<ScriptedMessenger>,
    store: &Arc<ResponseStore>,
    prompts: Vec<Prompt>,
) -> CampaignRunner {
    let settings = CampaignSettings {
        report_channel: ChannelRef::new("reports"),
        pacing: Duration::from_secs(2),
        cleanup_replies: false,
    };
    CampaignRunner::new(Arc::clone(port) as _, Arc::clone(store), prompts, settings)
}

/// Config that passes engine validation without Discord credentials.
pub(crate) fn engine_config() -> RollcallConfig {
    let mut config = RollcallConfig::default();
    config.channels.roster_channel_id = "roster".to_owned();
    config.channels.report_channel_id = "reports".to_owned();
    config.channels.reminder_channel_id = Some("general".to_owned());
    config.campaign.pacing_secs = 0;
    config.campaign.prompts = daily_prompts(Duration::from_secs(60));
    config
}
