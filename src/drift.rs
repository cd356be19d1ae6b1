use crate::clock::Clock;
use crate::error::Result;
use crate::fork::Fork;
use crate::host::HostApi;
use crate::store::ForkStore;
use crate::topology::TopologyResolver;
use chrono::Duration;
use tracing::debug;

pub const DEFAULT_STALE_AFTER_HOURS: i64 = 6;

/// Caches how far a fork's default branch trails its parent's.
pub struct DriftTracker<'a, H, S> {
    host: &'a H,
    store: &'a S,
    clock: &'a dyn Clock,
    stale_after: Duration,
}

impl<'a, H: HostApi, S: ForkStore> DriftTracker<'a, H, S> {
    pub fn new(host: &'a H, store: &'a S, clock: &'a dyn Clock, stale_after: Duration) -> Self {
        Self {
            host,
            store,
            clock,
            stale_after,
        }
    }

    /// Inactive forks are never stale.
    pub fn is_stale(&self, fork: &Fork) -> bool {
        fork.active
            && (fork.behind_by.is_none() || fork.updated_at < self.clock.now() - self.stale_after)
    }

    pub async fn behind_by(&self, fork: &mut Fork) -> Result<Option<u64>> {
        if self.is_stale(fork) {
            self.recompute(fork).await?;
        }
        Ok(fork.behind_by)
    }

    pub async fn is_current(&self, fork: &mut Fork) -> Result<bool> {
        Ok(self.behind_by(fork).await? == Some(0))
    }

    async fn recompute(&self, fork: &mut Fork) -> Result<()> {
        let topology = TopologyResolver::new(self.host, self.store, self.clock);
        let (Some(parent_owner), Some(parent_branch), Some(branch)) = (
            topology.parent_owner(fork).await?,
            topology.parent_default_branch(fork).await?,
            topology.default_branch(fork).await?,
        ) else {
            debug!(fork = %fork.handle(), "topology unavailable, drift not computed");
            return Ok(());
        };

        let base = format!("{parent_owner}:{parent_branch}");
        let head = format!("{}:{branch}", fork.owner);
        let comparison = self
            .host
            .compare_branches(&fork.owner, &fork.repo_name, &base, &head)
            .await?;

        debug!(fork = %fork.handle(), behind_by = comparison.behind_by, "drift recomputed");
        fork.behind_by = Some(comparison.behind_by);
        self.store.save(fork, self.clock.now())
    }
}
