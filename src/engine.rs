//! Wires configuration, storage, messaging and the scheduler into one
//! check-in engine.

use crate::campaign::{CampaignRunner, CampaignSettings, Report, run_campaign_with_retry};
use crate::config::RollcallConfig;
use crate::error::{CheckinError, Result};
use crate::messaging::{ChannelRef, MessagingPort};
use crate::reminder::ReminderSender;
use crate::scheduler::{JobCallback, JobHandle, JobSummary, Scheduler, TriggerOutcome};
use crate::store::{Comment, ResponseStore};
use futures_util::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

/// Job name used for the check-in campaign.
pub const CAMPAIGN_JOB: &str = "check-in campaign";
/// Job name used for the daily reminder.
pub const REMINDER_JOB: &str = "daily reminder";

#[derive(Default)]
struct Jobs {
    campaign: Option<JobHandle>,
    reminder: Option<JobHandle>,
}

/// One engine instance drives one campaign and one reminder.
pub struct CheckinEngine {
    config: RollcallConfig,
    port: Arc<dyn MessagingPort>,
    store: Arc<ResponseStore>,
    runner: Arc<CampaignRunner>,
    scheduler: Scheduler,
    jobs: Mutex<Jobs>,
    last_report: Arc<Mutex<Option<Report>>>,
}

impl CheckinEngine {
    /// Validate `config` and assemble the engine. Nothing is scheduled yet.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::InvalidConfig`] or
    /// [`CheckinError::InvalidRule`] for configuration that could fail at a
    /// later fire.
    pub fn new(config: RollcallConfig, port: Arc<dyn MessagingPort>, store: Arc<ResponseStore>) -> Result<Self> {
        config.validate_engine()?;

        let settings = CampaignSettings {
            report_channel: ChannelRef::new(config.channels.report_channel_id.clone()),
            pacing: config.campaign.pacing(),
            cleanup_replies: config.campaign.cleanup_replies,
        };
        let runner = Arc::new(CampaignRunner::new(
            Arc::clone(&port),
            Arc::clone(&store),
            config.campaign.prompts.clone(),
            settings,
        ));

        Ok(Self {
            config,
            port,
            store,
            runner,
            scheduler: Scheduler::new(),
            jobs: Mutex::new(Jobs::default()),
            last_report: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &RollcallConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ResponseStore> {
        &self.store
    }

    /// Register the campaign job and, when configured, the reminder job.
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::InvalidConfig`] if already started or shut
    /// down, or [`CheckinError::InvalidRule`] for an unsatisfiable rule.
    pub fn start(&self) -> Result<()> {
        let mut jobs = self.lock_jobs();
        if jobs.campaign.is_some() {
            return Err(CheckinError::InvalidConfig("engine already started".to_owned()));
        }

        let campaign = self.scheduler.schedule(
            CAMPAIGN_JOB,
            self.config.campaign.schedule.clone(),
            self.campaign_callback(),
        )?;

        let reminder = match self.reminder_sender() {
            Some(sender) => {
                let sender = Arc::new(sender);
                let callback: JobCallback = Arc::new(move || {
                    let sender = Arc::clone(&sender);
                    async move {
                        sender.send().await;
                    }
                    .boxed()
                });
                match self
                    .scheduler
                    .schedule(REMINDER_JOB, self.config.reminder.schedule.clone(), callback)
                {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        self.scheduler.cancel_all();
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        jobs.campaign = Some(campaign);
        jobs.reminder = reminder;
        info!(
            campaign = %self.config.campaign.schedule,
            reminder = reminder.is_some(),
            "check-in engine started"
        );
        Ok(())
    }

    fn campaign_callback(&self) -> JobCallback {
        let runner = Arc::clone(&self.runner);
        let policy = self.config.campaign.retry.clone();
        let last_report = Arc::clone(&self.last_report);
        Arc::new(move || {
            let runner = Arc::clone(&runner);
            let policy = policy.clone();
            let last_report = Arc::clone(&last_report);
            async move {
                match run_campaign_with_retry(&runner, &policy).await {
                    Ok(report) => {
                        *lock(&last_report) = Some(report);
                    }
                    Err(e) => {
                        error!("check-in campaign abandoned until the next scheduled run: {e}");
                    }
                }
            }
            .boxed()
        })
    }

    fn reminder_sender(&self) -> Option<ReminderSender> {
        let reminder = &self.config.reminder;
        if !reminder.enabled {
            return None;
        }
        let Some(channel) = &self.config.channels.reminder_channel_id else {
            warn!("reminder channel not configured (set CHECK_IN_CHANNEL_ID); daily reminder not scheduled");
            return None;
        };
        Some(ReminderSender::new(
            Arc::clone(&self.port),
            ChannelRef::new(channel.clone()),
            reminder.message.clone(),
            reminder.retry.clone(),
        ))
    }

    /// Run one campaign now, outside the scheduler, with batch retry.
    ///
    /// # Errors
    ///
    /// Returns the terminal batch error once retries are exhausted.
    pub async fn run_campaign_once(&self) -> Result<Report> {
        let report = run_campaign_with_retry(&self.runner, &self.config.campaign.retry).await?;
        *lock(&self.last_report) = Some(report.clone());
        Ok(report)
    }

    /// Fire the campaign job immediately under its single-flight guard.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::NotFound`] when the engine has not been
    /// started.
    pub async fn trigger_now(&self) -> Result<TriggerOutcome> {
        let handle = self
            .lock_jobs()
            .campaign
            .ok_or_else(|| CheckinError::NotFound("campaign job (engine not started)".to_owned()))?;
        self.scheduler.trigger(handle).await
    }

    /// Most recent completed report, from either a timed or a manual run.
    pub fn last_report(&self) -> Option<Report> {
        lock(&self.last_report).clone()
    }

    /// Attach a comment to a stored answer.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::NotFound`] for an unknown participant or
    /// index, or a storage error.
    pub fn add_comment(&self, participant: &str, answer_index: usize, author: &str, text: &str) -> Result<()> {
        self.store
            .add_comment(participant, answer_index, Comment::new(author, text))?;
        info!(participant, answer_index, author, "comment added");
        Ok(())
    }

    /// Registered jobs with their next fire times.
    pub fn next_fire_times(&self) -> Vec<JobSummary> {
        self.scheduler.jobs()
    }

    /// Cancel every job. In-flight runs finish on their own.
    pub fn shutdown(&self) {
        self.scheduler.cancel_all();
    }

    fn lock_jobs(&self) -> MutexGuard<'_, Jobs> {
        lock(&self.jobs)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
