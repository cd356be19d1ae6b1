//! Deferred reconciliation requests.
//!
//! The engine only needs "run this at or after a given time". [`JobQueue`] is
//! the small in-process runner the worker drains; delivery is at-least-once
//! and a job may run late, so the job handler checks the fork's
//! `next_run_at` before doing anything.

use crate::error::{ForkbombError, Result};
use crate::fork::ForkHandle;
use crate::store::{read_toml, write_toml};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileJob {
    /// The scheduled slot this job was created for. Stays fixed across retries.
    pub run_at: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    pub fork: ForkHandle,
}

impl ReconcileJob {
    pub fn new(fork: ForkHandle, run_at: DateTime<Utc>) -> Self {
        Self {
            run_at,
            not_before: run_at,
            attempts: 0,
            fork,
        }
    }
}

pub trait JobRunner {
    /// Fire-and-forget: run `job` no earlier than `job.not_before`.
    fn schedule_at(&self, job: ReconcileJob) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobFile {
    #[serde(default)]
    jobs: Vec<ReconcileJob>,
}

#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Mutex<Vec<ReconcileJob>>,
    path: Option<PathBuf>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file: JobFile = read_toml(&path)?;
        Ok(Self {
            jobs: Mutex::new(file.jobs),
            path: Some(path),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<ReconcileJob>>> {
        self.jobs
            .lock()
            .map_err(|_| ForkbombError::Store("job queue lock poisoned".to_string()))
    }

    fn persist(&self, jobs: &[ReconcileJob]) -> Result<()> {
        match &self.path {
            Some(path) => write_toml(
                path,
                &JobFile {
                    jobs: jobs.to_vec(),
                },
            ),
            None => Ok(()),
        }
    }

    pub fn pending(&self) -> Result<Vec<ReconcileJob>> {
        Ok(self.lock()?.clone())
    }

    /// Every job whose `not_before` has passed, earliest first. Jobs stay
    /// queued until [`JobQueue::ack`] or [`JobQueue::retry`] settles them, so
    /// a worker that dies mid-drain sees them again on restart.
    pub fn due(&self, now: DateTime<Utc>) -> Result<Vec<ReconcileJob>> {
        let mut due: Vec<_> = self
            .lock()?
            .iter()
            .filter(|j| j.not_before <= now)
            .cloned()
            .collect();
        due.sort_by_key(|j| j.not_before);
        Ok(due)
    }

    /// Removes one queued copy of `job`.
    pub fn ack(&self, job: &ReconcileJob) -> Result<()> {
        let mut jobs = self.lock()?;
        if let Some(pos) = jobs.iter().position(|j| j == job) {
            jobs.remove(pos);
            self.persist(&jobs)?;
        }
        Ok(())
    }

    /// Replaces a failed job with a delayed copy. Returns false, leaving the
    /// job removed, once `max_attempts` is used up.
    pub fn retry(
        &self,
        job: &ReconcileJob,
        now: DateTime<Utc>,
        delay: Duration,
        max_attempts: u32,
    ) -> Result<bool> {
        let mut jobs = self.lock()?;
        if let Some(pos) = jobs.iter().position(|j| j == job) {
            jobs.remove(pos);
        }

        let attempts = job.attempts + 1;
        let requeued = attempts < max_attempts;
        if requeued {
            jobs.push(ReconcileJob {
                attempts,
                not_before: now + delay,
                ..job.clone()
            });
        }
        self.persist(&jobs)?;
        Ok(requeued)
    }
}

impl JobRunner for JobQueue {
    fn schedule_at(&self, job: ReconcileJob) -> Result<()> {
        let mut jobs = self.lock()?;
        jobs.push(job);
        self.persist(&jobs)
    }
}
