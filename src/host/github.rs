use crate::error::{ForkbombError, Result};
use crate::host::{
    Comparison, HostApi, HostApiError, NewPullRequest, ParentRepo, PullRequestRef, RemoteRepo,
    RepoDetails,
};
use octocrab::models::Repository;
use octocrab::Octocrab;
use tracing::debug;

const PER_PAGE: u8 = 100;

#[derive(Clone)]
pub struct GitHubClient {
    octo: Octocrab,
}

impl GitHubClient {
    pub fn new(token: &str) -> Result<Self> {
        let octo = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| ForkbombError::Host(HostApiError::from_octocrab(e)))?;

        Ok(Self { octo })
    }

    pub async fn rate_limit(&self) -> Option<u32> {
        self.octo
            .ratelimit()
            .get()
            .await
            .ok()
            .and_then(|r| u32::try_from(r.rate.remaining).ok())
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient").finish_non_exhaustive()
    }
}

impl HostApi for GitHubClient {
    async fn list_repositories(
        &self,
        user: &str,
    ) -> std::result::Result<Vec<RemoteRepo>, HostApiError> {
        let mut repos = Vec::new();
        let mut page = 1u32;

        loop {
            let result = self
                .octo
                .users(user)
                .repos()
                .per_page(PER_PAGE)
                .page(page)
                .send()
                .await
                .map_err(HostApiError::from_octocrab)?;

            if result.items.is_empty() {
                break;
            }

            repos.extend(result.items.iter().map(|r| RemoteRepo {
                name: r.name.clone(),
                is_fork: r.fork.unwrap_or(false),
            }));

            if result.next.is_none() {
                break;
            }
            page += 1;
        }

        debug!(user, count = repos.len(), "listed repositories");
        Ok(repos)
    }

    async fn get_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> std::result::Result<RepoDetails, HostApiError> {
        let repo = self
            .octo
            .repos(owner, name)
            .get()
            .await
            .map_err(HostApiError::from_octocrab)?;

        Ok(repo_details(&repo))
    }

    async fn compare_branches(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> std::result::Result<Comparison, HostApiError> {
        let comparison = self
            .octo
            .commits(owner, repo)
            .compare(base, head)
            .send()
            .await
            .map_err(HostApiError::from_octocrab)?;

        Ok(Comparison {
            behind_by: u64::try_from(comparison.behind_by).unwrap_or(0),
        })
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pr: &NewPullRequest,
    ) -> std::result::Result<PullRequestRef, HostApiError> {
        let created = self
            .octo
            .pulls(owner, repo)
            .create(&pr.title, &pr.head, &pr.base)
            .body(&pr.body)
            .send()
            .await
            .map_err(HostApiError::from_octocrab)?;

        Ok(PullRequestRef {
            url: created.html_url.map(|u| u.to_string()),
        })
    }
}

fn repo_details(repo: &Repository) -> RepoDetails {
    let parent = repo.parent.as_deref().and_then(|p| {
        let owner = p.owner.as_ref()?.login.clone();
        Some(ParentRepo {
            owner,
            name: p.name.clone(),
            default_branch: p.default_branch.clone()?,
        })
    });

    RepoDetails {
        default_branch: repo.default_branch.clone(),
        parent,
    }
}
