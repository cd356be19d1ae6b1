//! The engine's public surface.
//!
//! `ForkService` owns the collaborators and hands out short-lived component
//! views (`topology()`, `drift()`, ...) that borrow them. It also carries the
//! job handler the worker calls for each due [`ReconcileJob`].

use crate::clock::Clock;
use crate::drift::{DriftTracker, DEFAULT_STALE_AFTER_HOURS};
use crate::error::{ForkbombError, Result};
use crate::fork::{Fork, ForkHandle, ForkSummary, UpdateFrequency};
use crate::host::HostApi;
use crate::jobs::{JobQueue, JobRunner, ReconcileJob};
use crate::registry::{ForkRegistry, DEFAULT_REFRESH_HOURS};
use crate::scheduler::Scheduler;
use crate::store::ForkStore;
use crate::sync::{PrSynchronizer, PrTemplate};
use crate::topology::TopologyResolver;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug)]
pub struct Policy {
    pub registry_refresh: Duration,
    pub drift_stale_after: Duration,
    pub job_retry_delay: Duration,
    pub job_max_attempts: u32,
    pub pr: PrTemplate,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            registry_refresh: Duration::hours(DEFAULT_REFRESH_HOURS),
            drift_stale_after: Duration::hours(DEFAULT_STALE_AFTER_HOURS),
            job_retry_delay: Duration::minutes(15),
            job_max_attempts: 5,
            pr: PrTemplate::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Ran { url: Option<String> },
    /// The fork has since been rescheduled to another slot, or this slot already ran.
    Superseded,
    Inactive,
    UnknownFork,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub ran: usize,
    pub skipped: usize,
    pub failed: usize,
    pub dropped: usize,
}

pub struct ForkService<H, S, R, C> {
    host: H,
    store: S,
    runner: R,
    clock: C,
    policy: Policy,
}

impl<H: HostApi, S: ForkStore, R: JobRunner, C: Clock> ForkService<H, S, R, C> {
    pub fn new(host: H, store: S, runner: R, clock: C, policy: Policy) -> Self {
        Self {
            host,
            store,
            runner,
            clock,
            policy,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn topology(&self) -> TopologyResolver<'_, H, S> {
        TopologyResolver::new(&self.host, &self.store, &self.clock)
    }

    pub fn drift(&self) -> DriftTracker<'_, H, S> {
        DriftTracker::new(
            &self.host,
            &self.store,
            &self.clock,
            self.policy.drift_stale_after,
        )
    }

    pub fn scheduler(&self) -> Scheduler<'_, S, R> {
        Scheduler::new(&self.store, &self.runner, &self.clock)
    }

    pub fn synchronizer(&self) -> PrSynchronizer<'_, H, S, R> {
        PrSynchronizer::new(&self.host, self.scheduler(), &self.policy.pr)
    }

    pub fn registry(&self) -> ForkRegistry<'_, H, S, R> {
        ForkRegistry::new(
            &self.host,
            &self.store,
            self.scheduler(),
            &self.clock,
            self.policy.registry_refresh,
        )
    }

    pub fn fork(&self, handle: &ForkHandle) -> Result<Fork> {
        self.store
            .find(handle)?
            .ok_or_else(|| ForkbombError::UnknownFork(handle.to_string()))
    }

    pub async fn summarize(&self, fork: &mut Fork) -> Result<ForkSummary> {
        let current = self.drift().is_current(fork).await?;
        Ok(ForkSummary {
            owner: fork.owner.clone(),
            repo_name: fork.repo_name.clone(),
            active: fork.active,
            update_frequency: fork.update_frequency,
            behind_by: fork.behind_by,
            current,
        })
    }

    pub async fn sync_for_user(&self, user: &str) -> Result<Vec<ForkSummary>> {
        let forks = self.registry().sync_for_user(user).await?;
        let mut summaries = Vec::with_capacity(forks.len());
        for mut fork in forks {
            summaries.push(self.summarize(&mut fork).await?);
        }
        Ok(summaries)
    }

    /// Turns automatic reconciliation on or off. `frequency` of `None` keeps
    /// the current cadence (or daily for a fork that had none).
    pub fn toggle_active(
        &self,
        handle: &ForkHandle,
        active: bool,
        frequency: Option<UpdateFrequency>,
    ) -> Result<Fork> {
        let mut fork = self.fork(handle)?;
        fork.active = active;
        if let Some(frequency) = frequency {
            fork.update_frequency = Some(frequency);
        }
        self.store.save(&mut fork, self.clock.now())?;
        self.scheduler().schedule(&mut fork)?;

        info!(fork = %handle, active, frequency = ?fork.update_frequency, "reconciliation toggled");
        Ok(fork)
    }

    pub async fn trigger_manual_sync(&self, handle: &ForkHandle) -> Result<Option<String>> {
        let mut fork = self.fork(handle)?;
        self.synchronizer().sync(&mut fork, true).await
    }

    pub async fn refresh_topology(&self, handle: &ForkHandle) -> Result<Fork> {
        let mut fork = self.fork(handle)?;
        let topology = self.topology();
        topology.invalidate(&mut fork)?;
        match (
            topology.parent_owner(&mut fork).await?,
            topology.parent_repo_name(&mut fork).await?,
        ) {
            (Some(owner), Some(repo)) => {
                let upstream = format!("{owner}/{repo}");
                info!(fork = %handle, %upstream, "topology refreshed");
            }
            _ => info!(fork = %handle, "topology refreshed, no upstream parent"),
        }
        Ok(fork)
    }

    /// Job handler for the runner. Duplicate and late deliveries fall out as
    /// [`JobOutcome::Superseded`].
    pub async fn run_job(&self, job: &ReconcileJob) -> Result<JobOutcome> {
        let Some(mut fork) = self.store.find(&job.fork)? else {
            warn!(fork = %job.fork, "job for a fork that is no longer tracked");
            return Ok(JobOutcome::UnknownFork);
        };
        if !fork.active {
            return Ok(JobOutcome::Inactive);
        }
        if fork.next_run_at != Some(job.run_at) {
            return Ok(JobOutcome::Superseded);
        }

        let url = self.synchronizer().sync(&mut fork, false).await?;
        Ok(JobOutcome::Ran { url })
    }
}

impl<H: HostApi, S: ForkStore, C: Clock> ForkService<H, S, JobQueue, C> {
    /// Runs every due job once. A job leaves the queue only after it has been
    /// handled. Transient failures go back on the queue with a delay; anything
    /// else is logged and dropped, and the fork's next slot is queued so the
    /// chain carries on.
    pub async fn run_due_jobs(&self) -> Result<DrainReport> {
        let now = self.clock.now();
        let mut report = DrainReport::default();

        for job in self.runner.due(now)? {
            let settled = match self.run_job(&job).await {
                Ok(JobOutcome::Ran { url }) => {
                    report.ran += 1;
                    debug!(fork = %job.fork, ?url, "reconciliation ran");
                    self.runner.ack(&job)
                }
                Ok(outcome) => {
                    report.skipped += 1;
                    debug!(fork = %job.fork, ?outcome, "reconciliation skipped");
                    self.runner.ack(&job)
                }
                Err(err) => {
                    report.failed += 1;
                    error!(
                        fork = %job.fork,
                        attempt = job.attempts + 1,
                        %err,
                        "reconciliation failed"
                    );
                    self.settle_failure(&job, &err, now)
                        .map(|dropped| report.dropped += usize::from(dropped))
                }
            };

            if let Err(err) = settled {
                error!(fork = %job.fork, %err, "could not settle job");
            }
        }

        Ok(report)
    }

    /// Requeues or drops a failed job. Returns whether it was dropped.
    fn settle_failure(
        &self,
        job: &ReconcileJob,
        err: &ForkbombError,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let requeued = if err.is_transient() {
            self.runner.retry(
                job,
                now,
                self.policy.job_retry_delay,
                self.policy.job_max_attempts,
            )?
        } else {
            self.runner.ack(job)?;
            false
        };
        if requeued {
            return Ok(false);
        }

        warn!(fork = %job.fork, "reconciliation dropped, moving on to the next slot");
        if let Some(mut fork) = self.store.find(&job.fork)? {
            self.scheduler().complete_and_reschedule(&mut fork)?;
        }
        Ok(true)
    }
}
