//! Job scheduler.
//!
//! Jobs are registered under a string id with a [`Trigger`]. A polling loop
//! fires due jobs on the tokio runtime. At most one instance of a job runs
//! at a time: a timer firing while the previous instance is still running
//! is skipped, and a manual [`ScheduleRunner::run_now`] is rejected with
//! [`PipelineError::SchedulingConflict`].

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, TimeZone, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics;

/// Boxed job future.
pub type JobFuture = Pin<Box<dyn Future<Output = PipelineResult<()>> + Send>>;

type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Trigger {
    /// Every day at a wall-clock time in a fixed UTC offset
    Daily {
        hour: u32,
        minute: u32,
        utc_offset_minutes: i32,
    },
    /// Fixed interval from scheduling
    Every(#[serde(serialize_with = "serialize_interval")] Duration),
    /// Once, then removed
    Once(DateTime<Utc>),
}

fn serialize_interval<S: serde::Serializer>(interval: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(interval.as_secs())
}

impl Trigger {
    pub fn daily(hour: u32, minute: u32) -> Self {
        Trigger::Daily {
            hour,
            minute,
            utc_offset_minutes: 0,
        }
    }

    /// Next fire time strictly after `after`.
    ///
    /// A `Once` trigger always answers its instant, even when it is past;
    /// the loop then fires it on the next tick.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Trigger::Daily {
                hour,
                minute,
                utc_offset_minutes,
            } => {
                let offset = FixedOffset::east_opt(utc_offset_minutes * 60)?;
                let local = after.with_timezone(&offset);
                let today = local.date_naive().and_hms_opt(hour, minute, 0)?;
                let candidate = offset.from_local_datetime(&today).single()?.with_timezone(&Utc);
                if candidate > after {
                    Some(candidate)
                } else {
                    Some(candidate + ChronoDuration::days(1))
                }
            }
            Trigger::Every(interval) => {
                let step = ChronoDuration::from_std(interval).ok()?;
                Some(after + step)
            }
            Trigger::Once(at) => Some(at),
        }
    }

    fn is_once(&self) -> bool {
        matches!(self, Trigger::Once(_))
    }
}

/// A registered job as listed by [`ScheduleRunner::list_jobs`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub trigger: Trigger,
    pub next_run: Option<DateTime<Utc>>,
    pub running: bool,
}

struct JobEntry {
    trigger: Trigger,
    next_run: Option<DateTime<Utc>>,
    job: JobFn,
}

struct Inner {
    jobs: Mutex<HashMap<String, JobEntry>>,
    running: Mutex<HashSet<String>>,
    poll_interval: Duration,
    shutdown_timeout: Duration,
    shutdown: watch::Sender<bool>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears a job's running flag when the instance ends, panics included.
struct RunningGuard {
    inner: Arc<Inner>,
    id: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        lock(&self.inner.running).remove(&self.id);
    }
}

impl Inner {
    /// Spawn one instance of `id`.
    fn launch(self: &Arc<Self>, id: &str, origin: &'static str) -> PipelineResult<()> {
        let job = lock(&self.jobs)
            .get(id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| PipelineError::UnknownJob(id.to_string()))?;

        if !lock(&self.running).insert(id.to_string()) {
            return Err(PipelineError::SchedulingConflict(id.to_string()));
        }
        let guard = RunningGuard {
            inner: Arc::clone(self),
            id: id.to_string(),
        };

        let job_id = id.to_string();
        tokio::spawn(async move {
            let _guard = guard;
            info!(job_id = %job_id, origin, "Job started");
            match AssertUnwindSafe(job()).catch_unwind().await {
                Ok(Ok(())) => {
                    info!(job_id = %job_id, "Job finished");
                    metrics::record_scheduler_run(&job_id, true);
                }
                Ok(Err(e)) => {
                    error!(job_id = %job_id, error = %e, "Job failed");
                    metrics::record_scheduler_run(&job_id, false);
                }
                Err(_) => {
                    error!(job_id = %job_id, "Job panicked");
                    metrics::record_scheduler_run(&job_id, false);
                }
            }
        });
        Ok(())
    }

    /// Fire every job whose next run is due.
    fn tick(self: &Arc<Self>, now: DateTime<Utc>) {
        let due: Vec<(String, Trigger)> = lock(&self.jobs)
            .iter()
            .filter(|(_, entry)| entry.next_run.is_some_and(|at| at <= now))
            .map(|(id, entry)| (id.clone(), entry.trigger))
            .collect();

        for (id, trigger) in due {
            match self.launch(&id, "timer") {
                Ok(()) => {}
                Err(PipelineError::SchedulingConflict(_)) => {
                    warn!(job_id = %id, "Previous run still in progress, skipping");
                    metrics::record_scheduler_skip(&id);
                }
                Err(e) => warn!(job_id = %id, error = %e, "Could not start job"),
            }

            let mut jobs = lock(&self.jobs);
            if trigger.is_once() {
                jobs.remove(&id);
            } else if let Some(entry) = jobs.get_mut(&id) {
                entry.next_run = entry.trigger.next_after(now);
                debug!(job_id = %id, next_run = ?entry.next_run, "Job rescheduled");
            }
        }
    }

    fn running_count(&self) -> usize {
        lock(&self.running).len()
    }

    /// Wait until no job instance is running.
    async fn wait_for_jobs(&self) {
        while self.running_count() > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// In-process job scheduler.
///
/// Cloning shares the same scheduler. Nothing fires until [`start`](Self::start).
#[derive(Clone)]
pub struct ScheduleRunner {
    inner: Arc<Inner>,
}

impl ScheduleRunner {
    pub fn new(poll_interval: Duration, shutdown_timeout: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(HashMap::new()),
                running: Mutex::new(HashSet::new()),
                poll_interval,
                shutdown_timeout,
                shutdown,
                loop_handle: Mutex::new(None),
            }),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.poll_interval, config.shutdown_timeout)
    }

    /// Register `job` under `id`, replacing any job with the same id.
    /// Returns the first fire time.
    pub fn schedule<F, Fut>(&self, id: impl Into<String>, trigger: Trigger, job: F) -> Option<DateTime<Utc>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PipelineResult<()>> + Send + 'static,
    {
        let id = id.into();
        let next_run = trigger.next_after(Utc::now());
        let job: JobFn = Arc::new(move || Box::pin(job()) as JobFuture);
        let replaced = lock(&self.inner.jobs)
            .insert(id.clone(), JobEntry { trigger, next_run, job })
            .is_some();
        info!(job_id = %id, ?trigger, ?next_run, replaced, "Job scheduled");
        next_run
    }

    /// Remove a job. A running instance is left to finish.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = lock(&self.inner.jobs).remove(id).is_some();
        if removed {
            info!(job_id = %id, "Job cancelled");
        }
        removed
    }

    /// Registered jobs ordered by next run.
    pub fn list_jobs(&self) -> Vec<JobInfo> {
        let running = lock(&self.inner.running).clone();
        let mut jobs: Vec<JobInfo> = lock(&self.inner.jobs)
            .iter()
            .map(|(id, entry)| JobInfo {
                id: id.clone(),
                trigger: entry.trigger,
                next_run: entry.next_run,
                running: running.contains(id),
            })
            .collect();
        jobs.sort_by(|a, b| a.next_run.cmp(&b.next_run).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Start `id` immediately, outside its schedule.
    ///
    /// Fails with `SchedulingConflict` while an instance is running and with
    /// `UnknownJob` when nothing is registered under `id`.
    pub fn run_now(&self, id: &str) -> PipelineResult<()> {
        self.inner.launch(id, "manual")
    }

    pub fn is_running(&self, id: &str) -> bool {
        lock(&self.inner.running).contains(id)
    }

    pub fn is_started(&self) -> bool {
        lock(&self.inner.loop_handle).is_some()
    }

    /// Start the polling loop. Starting twice is a no-op.
    pub fn start(&self) {
        let mut handle = lock(&self.inner.loop_handle);
        if handle.is_some() {
            warn!("Scheduler already started");
            return;
        }
        // Allow start after stop.
        self.inner.shutdown.send_replace(false);

        let inner = Arc::clone(&self.inner);
        let mut shutdown_rx = self.inner.shutdown.subscribe();
        info!(poll_ms = inner.poll_interval.as_millis() as u64, "Scheduler started");

        *handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(inner.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        inner.tick(Utc::now());
                    }
                }
            }
        }));
    }

    /// Stop the polling loop and wait for running jobs, up to the shutdown
    /// timeout. Returns the number of jobs still running afterwards.
    pub async fn stop(&self) -> usize {
        let _ = self.inner.shutdown.send(true);
        let handle = lock(&self.inner.loop_handle).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Scheduler loop ended abnormally");
            }
        }

        info!("Waiting for running jobs to complete...");
        if tokio::time::timeout(self.inner.shutdown_timeout, self.inner.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                running = self.inner.running_count(),
                "Shutdown timeout reached with jobs still running"
            );
        }
        info!("Scheduler stopped");
        self.inner.running_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_daily_later_today() {
        let next = Trigger::daily(18, 0).next_after(at("2024-05-01T09:30:00Z")).unwrap();
        assert_eq!(next, at("2024-05-01T18:00:00Z"));
    }

    #[test]
    fn test_daily_rolls_to_tomorrow() {
        let next = Trigger::daily(18, 0).next_after(at("2024-05-01T18:00:00Z")).unwrap();
        assert_eq!(next, at("2024-05-02T18:00:00Z"));
    }

    #[test]
    fn test_daily_with_offset() {
        let trigger = Trigger::Daily {
            hour: 18,
            minute: 0,
            utc_offset_minutes: 60,
        };
        // 18:00 at UTC+1 is 17:00 UTC
        let next = trigger.next_after(at("2024-05-01T16:00:00Z")).unwrap();
        assert_eq!(next, at("2024-05-01T17:00:00Z"));
        assert_eq!(next.hour(), 17);
    }

    #[test]
    fn test_every_and_once() {
        let now = at("2024-05-01T00:00:00Z");
        let every = Trigger::Every(Duration::from_secs(90)).next_after(now).unwrap();
        assert_eq!(every, at("2024-05-01T00:01:30Z"));

        let past = at("2024-04-30T00:00:00Z");
        assert_eq!(Trigger::Once(past).next_after(now), Some(past));
    }

    #[tokio::test]
    async fn test_schedule_list_cancel() {
        let runner = ScheduleRunner::new(Duration::from_millis(10), Duration::from_secs(1));
        runner.schedule("hourly", Trigger::Every(Duration::from_secs(3600)), || async { Ok(()) });
        runner.schedule("daily", Trigger::daily(18, 0), || async { Ok(()) });

        let jobs = runner.list_jobs();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.next_run.is_some() && !j.running));

        assert!(runner.cancel("hourly"));
        assert!(!runner.cancel("hourly"));
        assert_eq!(runner.list_jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_run_now_conflict() {
        let runner = ScheduleRunner::new(Duration::from_millis(10), Duration::from_secs(1));
        let release = Arc::new(Notify::new());
        let gate = release.clone();
        runner.schedule("long", Trigger::Every(Duration::from_secs(3600)), move || {
            let gate = gate.clone();
            async move {
                gate.notified().await;
                Ok(())
            }
        });

        tokio_test::assert_ok!(runner.run_now("long"));
        let err = tokio_test::assert_err!(runner.run_now("long"));
        assert!(matches!(err, PipelineError::SchedulingConflict(ref id) if id == "long"));
        assert!(runner.is_running("long"));

        release.notify_one();
        wait_until(|| !runner.is_running("long")).await;
        runner.run_now("long").unwrap();
        release.notify_one();
        wait_until(|| !runner.is_running("long")).await;
    }

    #[tokio::test]
    async fn test_run_now_unknown_job() {
        let runner = ScheduleRunner::new(Duration::from_millis(10), Duration::from_secs(1));
        assert!(matches!(runner.run_now("missing"), Err(PipelineError::UnknownJob(_))));
    }

    #[tokio::test]
    async fn test_nothing_fires_before_start() {
        let runner = ScheduleRunner::new(Duration::from_millis(5), Duration::from_secs(1));
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        runner.schedule("once", Trigger::Once(Utc::now()), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!runner.is_started());
    }

    #[tokio::test]
    async fn test_once_fires_and_is_removed() {
        let runner = ScheduleRunner::new(Duration::from_millis(5), Duration::from_secs(1));
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        runner.schedule("once", Trigger::Once(Utc::now()), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        runner.start();
        wait_until(|| count.load(Ordering::SeqCst) == 1).await;
        wait_until(|| runner.list_jobs().is_empty()).await;
        assert_eq!(runner.stop().await, 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_overlapping_timer_firing_is_skipped() {
        let runner = ScheduleRunner::new(Duration::from_millis(5), Duration::from_secs(1));
        let starts = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let (counter, gate) = (starts.clone(), release.clone());
        runner.schedule("busy", Trigger::Every(Duration::from_millis(10)), move || {
            let (counter, gate) = (counter.clone(), gate.clone());
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                Ok(())
            }
        });

        runner.start();
        wait_until(|| starts.load(Ordering::SeqCst) == 1).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        runner.cancel("busy");
        release.notify_one();
        assert_eq!(runner.stop().await, 0);
    }

    async fn explode() -> PipelineResult<()> {
        panic!("job exploded")
    }

    #[tokio::test]
    async fn test_panicking_job_clears_running_flag() {
        let runner = ScheduleRunner::new(Duration::from_millis(10), Duration::from_secs(1));
        runner.schedule("boom", Trigger::Every(Duration::from_secs(3600)), explode);

        runner.run_now("boom").unwrap();
        wait_until(|| !runner.is_running("boom")).await;
        assert!(runner.run_now("boom").is_ok());
    }

    #[tokio::test]
    async fn test_stop_waits_for_running_job() {
        let runner = ScheduleRunner::new(Duration::from_millis(10), Duration::from_secs(2));
        let done = Arc::new(AtomicUsize::new(0));
        let finished = done.clone();
        runner.schedule("slow", Trigger::Every(Duration::from_secs(3600)), move || {
            let finished = finished.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        runner.start();
        runner.run_now("slow").unwrap();
        assert_eq!(runner.stop().await, 0);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
