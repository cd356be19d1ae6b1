//! The repository host as seen by the reconciliation engine.
//!
//! Engine components are generic over [`HostApi`] so the octocrab client and
//! test doubles plug in the same way.

pub mod error;
pub mod github;

pub use error::{classify_pr_error, HostApiError};
pub use github::GitHubClient;

use std::future::Future;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteRepo {
    pub name: String,
    pub is_fork: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentRepo {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoDetails {
    pub default_branch: Option<String>,
    pub parent: Option<ParentRepo>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Comparison {
    pub behind_by: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    /// `owner:branch` the changes come from.
    pub head: String,
    /// Branch on the target repository the changes land on.
    pub base: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullRequestRef {
    pub url: Option<String>,
}

pub trait HostApi {
    /// Every repository owned by `user`, across all pages.
    fn list_repositories(
        &self,
        user: &str,
    ) -> impl Future<Output = Result<Vec<RemoteRepo>, HostApiError>> + Send;

    fn get_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> impl Future<Output = Result<RepoDetails, HostApiError>> + Send;

    /// `base` and `head` are `owner:branch` references.
    fn compare_branches(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> impl Future<Output = Result<Comparison, HostApiError>> + Send;

    fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr: &NewPullRequest,
    ) -> impl Future<Output = Result<PullRequestRef, HostApiError>> + Send;
}
