#![cfg(test)]

use crate::clock::Clock;
use crate::host::{
    Comparison, HostApi, HostApiError, NewPullRequest, ParentRepo, PullRequestRef, RemoteRepo,
    RepoDetails,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostCall {
    List(String),
    Get(String, String),
    Compare {
        owner: String,
        repo: String,
        base: String,
        head: String,
    },
    CreatePr {
        owner: String,
        repo: String,
        pr: NewPullRequest,
    },
}

#[derive(Clone, Debug)]
enum PrOutcome {
    Created(String),
    Fails(u16, String),
}

/// Scripted host: unknown repositories answer 404, PR creation succeeds with a
/// fixed URL unless told otherwise.
pub struct MockHost {
    listings: Mutex<HashMap<String, Vec<RemoteRepo>>>,
    details: Mutex<HashMap<(String, String), RepoDetails>>,
    behind: Mutex<HashMap<(String, String), u64>>,
    pr_outcome: Mutex<PrOutcome>,
    calls: Mutex<Vec<HostCall>>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self {
            listings: Mutex::default(),
            details: Mutex::default(),
            behind: Mutex::default(),
            pr_outcome: Mutex::new(PrOutcome::Created(
                "https://github.com/alice/tool/pull/1".to_string(),
            )),
            calls: Mutex::default(),
        }
    }
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(self, user: &str, repos: &[(&str, bool)]) -> Self {
        self.set_listing(user, repos);
        self
    }

    pub fn set_listing(&self, user: &str, repos: &[(&str, bool)]) {
        let repos = repos
            .iter()
            .map(|(name, is_fork)| RemoteRepo {
                name: name.to_string(),
                is_fork: *is_fork,
            })
            .collect();
        self.listings.lock().unwrap().insert(user.to_string(), repos);
    }

    pub fn fork_of(
        self,
        owner: &str,
        repo: &str,
        parent: &str,
        branch: &str,
        parent_branch: &str,
    ) -> Self {
        let (parent_owner, parent_repo) = parent.split_once('/').unwrap();
        self.details.lock().unwrap().insert(
            (owner.to_string(), repo.to_string()),
            RepoDetails {
                default_branch: Some(branch.to_string()),
                parent: Some(ParentRepo {
                    owner: parent_owner.to_string(),
                    name: parent_repo.to_string(),
                    default_branch: parent_branch.to_string(),
                }),
            },
        );
        self
    }

    pub fn without_parent(self, owner: &str, repo: &str, branch: &str) -> Self {
        self.details.lock().unwrap().insert(
            (owner.to_string(), repo.to_string()),
            RepoDetails {
                default_branch: Some(branch.to_string()),
                parent: None,
            },
        );
        self
    }

    pub fn behind(self, owner: &str, repo: &str, by: u64) -> Self {
        self.set_behind(owner, repo, by);
        self
    }

    pub fn set_behind(&self, owner: &str, repo: &str, by: u64) {
        self.behind
            .lock()
            .unwrap()
            .insert((owner.to_string(), repo.to_string()), by);
    }

    /// PR creation answers 422 with `message`.
    pub fn pr_fails(self, message: &str) -> Self {
        self.pr_fails_with(422, message)
    }

    pub fn pr_fails_with(self, status: u16, message: &str) -> Self {
        *self.pr_outcome.lock().unwrap() = PrOutcome::Fails(status, message.to_string());
        self
    }

    pub fn pr_creates(self, url: &str) -> Self {
        *self.pr_outcome.lock().unwrap() = PrOutcome::Created(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn lists(&self) -> usize {
        self.count(|c| matches!(c, HostCall::List(_)))
    }

    pub fn gets(&self) -> usize {
        self.count(|c| matches!(c, HostCall::Get(..)))
    }

    pub fn compares(&self) -> usize {
        self.count(|c| matches!(c, HostCall::Compare { .. }))
    }

    pub fn pr_requests(&self) -> usize {
        self.count(|c| matches!(c, HostCall::CreatePr { .. }))
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl HostApi for MockHost {
    async fn list_repositories(&self, user: &str) -> Result<Vec<RemoteRepo>, HostApiError> {
        self.record(HostCall::List(user.to_string()));
        Ok(self
            .listings
            .lock()
            .unwrap()
            .get(user)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepoDetails, HostApiError> {
        self.record(HostCall::Get(owner.to_string(), name.to_string()));
        self.details
            .lock()
            .unwrap()
            .get(&(owner.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| HostApiError::from_status(Some(404), "Not Found"))
    }

    async fn compare_branches(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<Comparison, HostApiError> {
        self.record(HostCall::Compare {
            owner: owner.to_string(),
            repo: repo.to_string(),
            base: base.to_string(),
            head: head.to_string(),
        });
        let behind_by = self
            .behind
            .lock()
            .unwrap()
            .get(&(owner.to_string(), repo.to_string()))
            .copied()
            .unwrap_or(0);
        Ok(Comparison { behind_by })
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr: &NewPullRequest,
    ) -> Result<PullRequestRef, HostApiError> {
        self.record(HostCall::CreatePr {
            owner: owner.to_string(),
            repo: repo.to_string(),
            pr: pr.clone(),
        });
        match self.pr_outcome.lock().unwrap().clone() {
            PrOutcome::Created(url) => Ok(PullRequestRef { url: Some(url) }),
            PrOutcome::Fails(status, message) => {
                Err(HostApiError::from_status(Some(status), message))
            }
        }
    }
}
