use crate::clock::Clock;
use crate::error::Result;
use crate::fork::{Fork, ForkHandle};
use crate::host::HostApi;
use crate::jobs::JobRunner;
use crate::scheduler::Scheduler;
use crate::store::ForkStore;
use chrono::Duration;
use itertools::Itertools;
use tracing::{debug, info};

pub const DEFAULT_REFRESH_HOURS: i64 = 24;

/// Keeps the per-user fork catalog in step with the host's repository listing.
pub struct ForkRegistry<'a, H, S, R> {
    host: &'a H,
    store: &'a S,
    scheduler: Scheduler<'a, S, R>,
    clock: &'a dyn Clock,
    refresh_after: Duration,
}

impl<'a, H: HostApi, S: ForkStore, R: JobRunner> ForkRegistry<'a, H, S, R> {
    pub fn new(
        host: &'a H,
        store: &'a S,
        scheduler: Scheduler<'a, S, R>,
        clock: &'a dyn Clock,
        refresh_after: Duration,
    ) -> Self {
        Self {
            host,
            store,
            scheduler,
            clock,
            refresh_after,
        }
    }

    /// The user's forks ordered by repo name, refreshing the whole catalog
    /// first when it is empty or out of date.
    pub async fn sync_for_user(&self, user: &str) -> Result<Vec<Fork>> {
        let tracked = self.store.list_for_owner(user)?;
        if self.needs_refresh(&tracked) {
            self.refresh(user).await?;
        } else {
            debug!(user, count = tracked.len(), "fork catalog is fresh");
        }
        self.store.list_for_owner(user)
    }

    /// Judged by the most recently created record's last update.
    pub fn needs_refresh(&self, tracked: &[Fork]) -> bool {
        match tracked.iter().max_by_key(|f| f.created_at) {
            None => true,
            Some(newest) => newest.updated_at <= self.clock.now() - self.refresh_after,
        }
    }

    async fn refresh(&self, user: &str) -> Result<usize> {
        let names: Vec<String> = self
            .host
            .list_repositories(user)
            .await?
            .into_iter()
            .filter(|r| r.is_fork)
            .map(|r| r.name)
            .unique()
            .collect();

        let now = self.clock.now();
        for name in &names {
            let handle = ForkHandle::new(user, name.as_str());
            let mut fork = match self.store.find(&handle)? {
                Some(existing) => existing,
                None => {
                    info!(fork = %handle, "tracking new fork");
                    Fork::new(user, name.as_str(), now)
                }
            };
            // saved even when unchanged to refresh the staleness clock
            self.store.save(&mut fork, now)?;
            self.scheduler.schedule(&mut fork)?;
        }

        info!(user, forks = names.len(), "fork catalog refreshed");
        Ok(names.len())
    }
}
