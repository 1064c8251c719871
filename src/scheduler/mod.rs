//! Daily trigger for the cross-tenant audit archival.
//!
//! The loop sleeps until the next local fire time, runs the [`ArchiveJob`] in
//! its own task and goes back to sleep. A failing or panicking run is logged
//! and never stops the loop; only the shutdown signal does.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Local, LocalResult, NaiveTime, TimeZone};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::services::archive_service::{ArchiveJob, ArchiveSummary};

/// How far ahead to look for a fire time that exists on the local clock
const MAX_LOOKAHEAD_DAYS: u64 = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid schedule time {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },

    #[error("No valid fire time within {0} days")]
    NoFireTime(u64),
}

/// Fixed wall-clock time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(|time| Self { time })
            .ok_or(ScheduleError::InvalidTime { hour, minute })
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// First fire time strictly after `now` in `now`'s timezone.
    ///
    /// Days where the time falls in a DST gap are skipped; when it occurs twice
    /// the earlier instant is used.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DateTime<Tz>, ScheduleError> {
        let tz = now.timezone();
        let today = now.date_naive();

        for offset in 0..=MAX_LOOKAHEAD_DAYS {
            let Some(day) = today.checked_add_days(Days::new(offset)) else {
                break;
            };
            if let Some(candidate) = earliest(tz.from_local_datetime(&day.and_time(self.time))) {
                if candidate > *now {
                    return Ok(candidate);
                }
            }
        }

        Err(ScheduleError::NoFireTime(MAX_LOOKAHEAD_DAYS))
    }
}

fn earliest<T>(local: LocalResult<T>) -> Option<T> {
    match local {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(first, _) => Some(first),
        LocalResult::None => None,
    }
}

/// What happened to one archival trigger
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(ArchiveSummary),
    Failed(String),
    /// Another run was still in progress
    Skipped,
}

/// Clonable entry point for triggering archival runs
#[derive(Clone)]
pub struct SchedulerHandle {
    job: Arc<dyn ArchiveJob>,
    running: Arc<Mutex<()>>,
}

impl SchedulerHandle {
    pub fn new(job: Arc<dyn ArchiveJob>) -> Self {
        Self {
            job,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Run the job once. Never propagates failures or panics.
    pub async fn run_once(&self) -> RunOutcome {
        let Ok(running) = Arc::clone(&self.running).try_lock_owned() else {
            warn!("Audit archival already running, skipping trigger");
            return RunOutcome::Skipped;
        };

        // The lock lives with the job task, so a dropped caller keeps it held
        let job = Arc::clone(&self.job);
        let task = tokio::spawn(async move {
            let _running = running;
            job.archive_aged_records().await
        });
        match task.await {
            Ok(Ok(summary)) => {
                info!(
                    "Audit archival run completed: {} records archived ({} tenants, {} failures)",
                    summary.total(),
                    summary.tenants_processed,
                    summary.failures.len()
                );
                for failure in &summary.failures {
                    error!("Tenant {} failed during archival: {}", failure.tenant_id, failure.reason);
                }
                RunOutcome::Completed(summary)
            }
            Ok(Err(e)) => {
                error!("Audit archival run failed: {}", e);
                RunOutcome::Failed(e.to_string())
            }
            Err(e) => {
                error!("Audit archival run aborted: {}", e);
                RunOutcome::Failed(format!("archival task aborted: {}", e))
            }
        }
    }
}

/// Source of local wall-clock time for the scheduler loop
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Reads the host clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Fires [`SchedulerHandle::run_once`] every day at the configured local time
pub struct AuditArchiveScheduler {
    schedule: DailySchedule,
    handle: SchedulerHandle,
    clock: Arc<dyn WallClock>,
}

impl AuditArchiveScheduler {
    pub fn new(schedule: DailySchedule, handle: SchedulerHandle) -> Self {
        Self {
            schedule,
            handle,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn next_run(&self) -> Result<DateTime<Local>, ScheduleError> {
        self.schedule.next_after(&self.clock.now())
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Audit archive scheduler started ({} daily)", self.schedule.time());

            loop {
                let now = self.clock.now();
                let next = match self.schedule.next_after(&now) {
                    Ok(next) => next,
                    Err(e) => {
                        error!("Audit archive scheduler cannot continue: {}", e);
                        break;
                    }
                };
                let wait = (next.clone() - now).to_std().unwrap_or(Duration::ZERO);
                debug!("Next audit archival at {}", next);

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        self.handle.run_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Audit archive scheduler stopped");
        })
    }
}
