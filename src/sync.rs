use crate::error::Result;
use crate::fork::Fork;
use crate::host::{classify_pr_error, HostApi, NewPullRequest, ParentRepo};
use crate::jobs::JobRunner;
use crate::scheduler::Scheduler;
use crate::store::ForkStore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrTemplate {
    pub title: String,
    pub body: String,
}

impl Default for PrTemplate {
    fn default() -> Self {
        Self {
            title: "Upstream changes".to_string(),
            body: "Automatically opened by forkbomb".to_string(),
        }
    }
}

/// Opens "pull upstream into the fork" pull requests.
pub struct PrSynchronizer<'a, H, S, R> {
    host: &'a H,
    scheduler: Scheduler<'a, S, R>,
    template: &'a PrTemplate,
}

impl<'a, H: HostApi, S: ForkStore, R: JobRunner> PrSynchronizer<'a, H, S, R> {
    pub fn new(host: &'a H, scheduler: Scheduler<'a, S, R>, template: &'a PrTemplate) -> Self {
        Self {
            host,
            scheduler,
            template,
        }
    }

    /// Returns the URL of the PR opened, or `None` when there was nothing to
    /// open. Automated runs (`manual == false`) queue the next run on every
    /// non-error exit.
    pub async fn sync(&self, fork: &mut Fork, manual: bool) -> Result<Option<String>> {
        let details = self
            .host
            .get_repository(&fork.owner, &fork.repo_name)
            .await?;

        let url = match (details.parent, details.default_branch) {
            (Some(parent), Some(branch)) => self.open_pull_request(fork, &parent, &branch).await?,
            (Some(_), None) => {
                warn!(fork = %fork.handle(), "repository reports no default branch");
                None
            }
            (None, _) => {
                info!(fork = %fork.handle(), "not a fork any more, nothing to sync");
                None
            }
        };

        if !manual {
            self.scheduler.complete_and_reschedule(fork)?;
        }
        Ok(url)
    }

    async fn open_pull_request(
        &self,
        fork: &Fork,
        parent: &ParentRepo,
        branch: &str,
    ) -> Result<Option<String>> {
        let pr = NewPullRequest {
            title: self.template.title.clone(),
            body: self.template.body.clone(),
            head: format!("{}:{}", parent.owner, parent.default_branch),
            base: branch.to_string(),
        };

        match self
            .host
            .create_pull_request(&fork.owner, &fork.repo_name, &pr)
            .await
        {
            Ok(created) => {
                info!(fork = %fork.handle(), url = ?created.url, "opened upstream pull request");
                Ok(created.url)
            }
            Err(err) => {
                let kind = classify_pr_error(&err);
                if !kind.is_absorbed() {
                    return Err(err.into());
                }
                info!(fork = %fork.handle(), ?kind, "nothing to propose");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForkbombError;
    use crate::fork::UpdateFrequency;
    use crate::jobs::JobQueue;
    use crate::store::MemoryStore;
    use crate::test_utils::{at, HostCall, ManualClock, MockHost};

    struct Fixture {
        host: MockHost,
        store: MemoryStore,
        queue: JobQueue,
        clock: ManualClock,
        template: PrTemplate,
    }

    impl Fixture {
        fn new(host: MockHost) -> Self {
            Self {
                host,
                store: MemoryStore::new(),
                queue: JobQueue::new(),
                clock: ManualClock::new(at("2024-01-16T00:00:00Z")),
                template: PrTemplate::default(),
            }
        }

        fn synchronizer(&self) -> PrSynchronizer<'_, MockHost, MemoryStore, JobQueue> {
            PrSynchronizer::new(
                &self.host,
                Scheduler::new(&self.store, &self.queue, &self.clock),
                &self.template,
            )
        }
    }

    fn daily_fork() -> Fork {
        let mut fork = Fork::new("alice", "tool", at("2024-01-15T10:00:00Z"));
        fork.active = true;
        fork.update_frequency = Some(UpdateFrequency::Daily);
        fork
    }

    fn upstream() -> MockHost {
        MockHost::new().fork_of("alice", "tool", "upstream/tool", "main", "master")
    }

    #[tokio::test]
    async fn opens_pull_from_upstream_into_fork() {
        let fx = Fixture::new(upstream().pr_creates("https://github.com/alice/tool/pull/7"));
        let mut fork = daily_fork();

        let url = fx.synchronizer().sync(&mut fork, true).await.unwrap();
        assert_eq!(url.as_deref(), Some("https://github.com/alice/tool/pull/7"));

        let created = fx
            .host
            .calls()
            .into_iter()
            .find_map(|c| match c {
                HostCall::CreatePr { owner, repo, pr } => Some((owner, repo, pr)),
                _ => None,
            })
            .unwrap();
        assert_eq!(created.0, "alice");
        assert_eq!(created.1, "tool");
        assert_eq!(created.2.head, "upstream:master");
        assert_eq!(created.2.base, "main");
        assert_eq!(created.2.title, "Upstream changes");
    }

    #[tokio::test]
    async fn duplicate_pr_is_quietly_absorbed() {
        let fx = Fixture::new(
            upstream().pr_fails("A pull request already exists for owner:branch"),
        );
        let mut fork = daily_fork();

        assert_eq!(fx.synchronizer().sync(&mut fork, true).await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_diff_is_quietly_absorbed_and_chain_continues() {
        let fx = Fixture::new(
            upstream().pr_fails("No commits between alice:main and upstream:master"),
        );
        let mut fork = daily_fork();

        assert_eq!(fx.synchronizer().sync(&mut fork, false).await.unwrap(), None);
        assert_eq!(fork.next_run_at, Some(at("2024-01-17T00:00:00Z")));
    }

    #[tokio::test]
    async fn unknown_failure_propagates_and_breaks_chain() {
        let fx = Fixture::new(upstream().pr_fails("Validation Failed: rate limited"));
        let mut fork = daily_fork();

        let err = fx.synchronizer().sync(&mut fork, false).await.unwrap_err();
        assert!(matches!(err, ForkbombError::Host(ref e) if e.message.contains("rate limited")));
        assert!(fx.queue.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_parent_still_schedules_automated_run() {
        let fx = Fixture::new(MockHost::new().without_parent("alice", "tool", "main"));
        let mut fork = daily_fork();

        assert_eq!(fx.synchronizer().sync(&mut fork, false).await.unwrap(), None);
        assert_eq!(fx.host.pr_requests(), 0);

        let pending = fx.queue.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].run_at, at("2024-01-17T00:00:00Z"));
    }

    #[tokio::test]
    async fn manual_run_never_schedules() {
        let fx = Fixture::new(upstream());
        let mut fork = daily_fork();

        fx.synchronizer().sync(&mut fork, true).await.unwrap();
        assert!(fx.queue.pending().unwrap().is_empty());
        assert_eq!(fork.next_run_at, None);
    }
}
