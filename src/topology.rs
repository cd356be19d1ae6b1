//! Lazily resolved fork → parent relationship.
//!
//! All four fields come from one `get_repository` call and are saved
//! together. The attempt itself is recorded in `topology_checked_at`, so a
//! fork without a parent is asked about once and then left alone until
//! [`TopologyResolver::invalidate`] is called.

use crate::clock::Clock;
use crate::error::Result;
use crate::fork::Fork;
use crate::host::HostApi;
use crate::store::ForkStore;
use tracing::{debug, info};

pub struct TopologyResolver<'a, H, S> {
    host: &'a H,
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, H: HostApi, S: ForkStore> TopologyResolver<'a, H, S> {
    pub fn new(host: &'a H, store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { host, store, clock }
    }

    pub async fn ensure(&self, fork: &mut Fork) -> Result<()> {
        if fork.topology_resolved() || fork.topology_attempted() {
            return Ok(());
        }
        self.load(fork).await
    }

    async fn load(&self, fork: &mut Fork) -> Result<()> {
        debug!(fork = %fork.handle(), "fetching fork topology");
        let details = self
            .host
            .get_repository(&fork.owner, &fork.repo_name)
            .await?;

        fork.default_branch = details.default_branch;
        match details.parent {
            Some(parent) => {
                fork.parent_owner = Some(parent.owner);
                fork.parent_repo_name = Some(parent.name);
                fork.parent_default_branch = Some(parent.default_branch);
            }
            None => {
                info!(fork = %fork.handle(), "repository has no accessible parent");
                fork.parent_owner = None;
                fork.parent_repo_name = None;
                fork.parent_default_branch = None;
            }
        }

        let now = self.clock.now();
        fork.topology_checked_at = Some(now);
        self.store.save(fork, now)
    }

    pub async fn parent_owner(&self, fork: &mut Fork) -> Result<Option<String>> {
        self.ensure(fork).await?;
        Ok(fork.parent_owner.clone())
    }

    pub async fn parent_repo_name(&self, fork: &mut Fork) -> Result<Option<String>> {
        self.ensure(fork).await?;
        Ok(fork.parent_repo_name.clone())
    }

    pub async fn default_branch(&self, fork: &mut Fork) -> Result<Option<String>> {
        self.ensure(fork).await?;
        Ok(fork.default_branch.clone())
    }

    pub async fn parent_default_branch(&self, fork: &mut Fork) -> Result<Option<String>> {
        self.ensure(fork).await?;
        Ok(fork.parent_default_branch.clone())
    }

    /// Drops the cached topology; the next access fetches it again.
    pub fn invalidate(&self, fork: &mut Fork) -> Result<()> {
        fork.invalidate_topology();
        self.store.save(fork, self.clock.now())
    }
}
