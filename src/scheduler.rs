//! Recurring reconciliation.
//!
//! Each active fork has at most one reconciliation job in flight. The slot it
//! was queued for is recorded on the fork as `next_run_at`; a job whose
//! `run_at` no longer matches is stale and gets dropped by the job handler.
//! Automated runs end in [`Scheduler::complete_and_reschedule`], which queues
//! the following slot. Manual runs never do.

use crate::clock::Clock;
use crate::error::Result;
use crate::fork::{Fork, UpdateFrequency};
use crate::jobs::{JobRunner, ReconcileJob};
use crate::store::ForkStore;
use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, TimeZone, Utc};
use tracing::{debug, info};

/// Start of the next calendar day, week (Monday) or month, in UTC.
pub fn next_run_time(
    frequency: Option<UpdateFrequency>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let date = match frequency? {
        UpdateFrequency::Daily => (now + Duration::days(1)).date_naive(),
        UpdateFrequency::Weekly => {
            let later = (now + Duration::weeks(1)).date_naive();
            later - Duration::days(i64::from(later.weekday().num_days_from_monday()))
        }
        UpdateFrequency::Monthly => now
            .date_naive()
            .checked_add_months(Months::new(1))?
            .with_day(1)?,
    };
    Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

pub struct Scheduler<'a, S, R> {
    store: &'a S,
    runner: &'a R,
    clock: &'a dyn Clock,
}

impl<'a, S: ForkStore, R: JobRunner> Scheduler<'a, S, R> {
    pub fn new(store: &'a S, runner: &'a R, clock: &'a dyn Clock) -> Self {
        Self {
            store,
            runner,
            clock,
        }
    }

    /// Queues the fork's next run unless it is inactive, has no cadence, or
    /// that slot is already queued. Returns the newly queued slot.
    pub fn schedule(&self, fork: &mut Fork) -> Result<Option<DateTime<Utc>>> {
        if !fork.active {
            return Ok(None);
        }

        let now = self.clock.now();
        let Some(run_at) = next_run_time(fork.update_frequency, now) else {
            return Ok(None);
        };

        if fork.next_run_at == Some(run_at) {
            debug!(fork = %fork.handle(), %run_at, "reconciliation already queued");
            return Ok(None);
        }

        self.runner
            .schedule_at(ReconcileJob::new(fork.handle(), run_at))?;
        fork.next_run_at = Some(run_at);
        self.store.save(fork, now)?;

        info!(fork = %fork.handle(), %run_at, "reconciliation queued");
        Ok(Some(run_at))
    }

    /// Chain step after an automated run: the slot just served is consumed,
    /// so the following one is queued.
    pub fn complete_and_reschedule(&self, fork: &mut Fork) -> Result<Option<DateTime<Utc>>> {
        self.schedule(fork)
    }
}
