//! Job loops driving calendar-triggered callbacks.
//!
//! Every job runs on its own tokio task: sleep until the next fire time,
//! then hand the callback to a worker task. A job never has two callback
//! invocations in flight; a fire that lands while the previous one is still
//! running is skipped.

use crate::error::{CheckinError, Result};
use crate::scheduler::rule::CalendarRule;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Callback invoked on every fire.
pub type JobCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Identifies a registered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(u64);

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Result of [`Scheduler::trigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The callback ran to completion.
    Completed,
    /// An earlier invocation was still running; nothing was started.
    AlreadyRunning,
    /// The job has been cancelled.
    Cancelled,
}

/// Diagnostic view of one job.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub handle: JobHandle,
    pub name: String,
    pub rule: String,
    pub next_fire: Option<DateTime<Utc>>,
}

struct Job {
    name: String,
    rule: CalendarRule,
    callback: JobCallback,
    next_fire: Mutex<Option<DateTime<Utc>>>,
    in_flight: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
}

impl Job {
    fn next_fire(&self) -> Option<DateTime<Utc>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        *self.next_fire.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set_next_fire(&self, at: Option<DateTime<Utc>>) {
        *self.next_fire.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = at;
    }

    /// Run the callback unless an invocation is already in flight.
    async fn fire(&self) -> bool {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!(job = %self.name, "previous run still in progress, skipping this fire");
            return false;
        };
        debug!(job = %self.name, "job firing");
        (self.callback)().await;
        true
    }
}

/// Owns the registered jobs. Dropping the scheduler cancels them.
pub struct Scheduler {
    jobs: Mutex<BTreeMap<JobHandle, Arc<Job>>>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a job and start its timer. Must be called inside a tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::InvalidRule`] if `rule` can never fire, or
    /// [`CheckinError::InvalidConfig`] after [`Scheduler::cancel_all`].
    pub fn schedule(
        &self,
        name: impl Into<String>,
        rule: CalendarRule,
        callback: JobCallback,
    ) -> Result<JobHandle> {
        let name = name.into();
        if self.shutdown.is_cancelled() {
            return Err(CheckinError::InvalidConfig(format!(
                "cannot schedule `{name}`: scheduler is shut down"
            )));
        }
        let first = rule.next_fire_after(Utc::now())?;

        let handle = JobHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let job = Arc::new(Job {
            name,
            rule,
            callback,
            next_fire: Mutex::new(Some(first)),
            in_flight: tokio::sync::Mutex::new(()),
            cancel: self.shutdown.child_token(),
        });
        info!(job = %job.name, %handle, rule = %job.rule, next_fire = %first, "job scheduled");

        self.lock().insert(handle, Arc::clone(&job));
        tokio::spawn(job_loop(job, first));
        Ok(handle)
    }

    /// When the job fires next; `None` once cancelled or unknown.
    pub fn next_fire_time(&self, handle: JobHandle) -> Option<DateTime<Utc>> {
        self.lock().get(&handle).and_then(|job| job.next_fire())
    }

    /// All registered jobs, in registration order.
    pub fn jobs(&self) -> Vec<JobSummary> {
        self.lock()
            .iter()
            .map(|(handle, job)| JobSummary {
                handle: *handle,
                name: job.name.clone(),
                rule: job.rule.to_string(),
                next_fire: job.next_fire(),
            })
            .collect()
    }

    /// Run a job's callback now, under the same single-flight guard as
    /// timed fires.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::NotFound`] for an unknown handle.
    pub async fn trigger(&self, handle: JobHandle) -> Result<TriggerOutcome> {
        let job = self
            .lock()
            .get(&handle)
            .cloned()
            .ok_or_else(|| CheckinError::NotFound(format!("no job {handle}")))?;
        if job.cancel.is_cancelled() {
            return Ok(TriggerOutcome::Cancelled);
        }
        info!(job = %job.name, "manual trigger");
        Ok(if job.fire().await {
            TriggerOutcome::Completed
        } else {
            TriggerOutcome::AlreadyRunning
        })
    }

    /// Stop all timers. In-flight callbacks run to completion. Idempotent.
    pub fn cancel_all(&self) {
        if !self.shutdown.is_cancelled() {
            info!(jobs = self.lock().len(), "cancelling all scheduled jobs");
        }
        self.shutdown.cancel();
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<JobHandle, Arc<Job>>> {
        self.jobs.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn job_loop(job: Arc<Job>, first: DateTime<Utc>) {
    let mut target = first;
    loop {
        let wait = (target - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            () = job.cancel.cancelled() => break,
            () = tokio::time::sleep(wait) => {}
        }

        let worker = Arc::clone(&job);
        tokio::spawn(async move {
            worker.fire().await;
        });

        // A fire computed from the wall clock can land a hair early; never
        // schedule the same slot twice.
        let after = target.max(Utc::now());
        match job.rule.next_fire_after(after) {
            Ok(next) => {
                debug!(job = %job.name, next_fire = %next, "job rescheduled");
                job.set_next_fire(Some(next));
                target = next;
            }
            Err(e) => {
                error!(job = %job.name, "job stopped: {e}");
                break;
            }
        }
    }
    job.set_next_fire(None);
    debug!(job = %job.name, "job loop exited");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::scheduler::rule::Weekday;
    use futures_util::FutureExt;
    use std::sync::atomic::AtomicU32;

    fn counting_callback(counter: Arc<AtomicU32>, hold: Duration) -> JobCallback {
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(hold).await;
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_reports_next_fire_time() {
        let scheduler = Scheduler::new();
        let rule = CalendarRule::daily(8, 0, "America/Los_Angeles");
        let handle = scheduler
            .schedule("campaign", rule.clone(), counting_callback(Arc::default(), Duration::ZERO))
            .unwrap();

        let next = scheduler.next_fire_time(handle).unwrap();
        assert!(next > Utc::now());
        assert_eq!(next, rule.next_fire_after(Utc::now()).unwrap());

        let jobs = scheduler.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "campaign");
        assert_eq!(jobs[0].rule, "daily at 08:00 America/Los_Angeles");
    }

    #[tokio::test(start_paused = true)]
    async fn unsatisfiable_rule_is_rejected() {
        let scheduler = Scheduler::new();
        let rule = CalendarRule::on_weekdays(8, 0, "UTC", &[]);
        let result = scheduler.schedule("never", rule, counting_callback(Arc::default(), Duration::ZERO));
        assert!(matches!(result, Err(CheckinError::InvalidRule(_))));
        assert!(scheduler.jobs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_the_callback() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        scheduler
            .schedule(
                "daily",
                CalendarRule::daily(0, 0, "UTC"),
                counting_callback(Arc::clone(&counter), Duration::ZERO),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_secs(49 * 3600)).await;
        assert!(counter.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_triggers_are_single_flight() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        let handle = scheduler
            .schedule(
                "slow",
                CalendarRule::on_weekdays(8, 0, "UTC", &Weekday::WORKWEEK),
                counting_callback(Arc::clone(&counter), Duration::from_secs(30)),
            )
            .unwrap();

        let (a, b) = tokio::join!(scheduler.trigger(handle), scheduler.trigger(handle));
        let mut outcomes = [a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| *o == TriggerOutcome::AlreadyRunning);
        assert_eq!(outcomes, [TriggerOutcome::Completed, TriggerOutcome::AlreadyRunning]);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Guard is released once the first invocation returns.
        assert_eq!(scheduler.trigger(handle).await.unwrap(), TriggerOutcome::Completed);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_is_idempotent_and_clears_next_fire() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        let handle = scheduler
            .schedule(
                "daily",
                CalendarRule::daily(0, 0, "UTC"),
                counting_callback(Arc::clone(&counter), Duration::ZERO),
            )
            .unwrap();

        scheduler.cancel_all();
        scheduler.cancel_all();
        assert!(scheduler.next_fire_time(handle).is_none());
        assert_eq!(scheduler.trigger(handle).await.unwrap(), TriggerOutcome::Cancelled);

        tokio::time::sleep(Duration::from_secs(3 * 86_400)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(
            scheduler
                .schedule("late", CalendarRule::daily(1, 0, "UTC"), counting_callback(counter, Duration::ZERO))
                .is_err()
        );
    }

    #[tokio::test]
    async fn unknown_handle_is_not_found() {
        let scheduler = Scheduler::new();
        assert!(matches!(
            scheduler.trigger(JobHandle(99)).await,
            Err(CheckinError::NotFound(_))
        ));
        assert!(scheduler.next_fire_time(JobHandle(99)).is_none());
    }
}
