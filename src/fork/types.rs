use crate::error::ForkbombError;
use crate::fork::handle::ForkHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const GITHUB_WEB: &str = "https://github.com";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl UpdateFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateFrequency::Daily => "daily",
            UpdateFrequency::Weekly => "weekly",
            UpdateFrequency::Monthly => "monthly",
        }
    }

    /// Parses a cadence where `none` (or an empty string) means no schedule.
    pub fn parse_optional(s: &str) -> Result<Option<Self>, ForkbombError> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(None),
            other => other.parse().map(Some),
        }
    }
}

impl fmt::Display for UpdateFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateFrequency {
    type Err = ForkbombError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(UpdateFrequency::Daily),
            "weekly" => Ok(UpdateFrequency::Weekly),
            "monthly" => Ok(UpdateFrequency::Monthly),
            other => Err(ForkbombError::Config(format!(
                "unknown update frequency {other:?}: expected daily, weekly, monthly or none"
            ))),
        }
    }
}

/// A tracked fork and its cached view of the upstream relationship.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fork {
    pub owner: String,
    pub repo_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_repo_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_default_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_checked_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behind_by: Option<u64>,

    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_frequency: Option<UpdateFrequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fork {
    pub fn new(owner: impl Into<String>, repo_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            owner: owner.into(),
            repo_name: repo_name.into(),
            parent_owner: None,
            parent_repo_name: None,
            default_branch: None,
            parent_default_branch: None,
            topology_checked_at: None,
            behind_by: None,
            active: false,
            update_frequency: None,
            next_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn handle(&self) -> ForkHandle {
        ForkHandle::new(self.owner.clone(), self.repo_name.clone())
    }

    pub fn has_parent(&self) -> bool {
        self.parent_owner.is_some() && self.parent_repo_name.is_some()
    }

    pub fn topology_resolved(&self) -> bool {
        self.has_parent() && self.default_branch.is_some() && self.parent_default_branch.is_some()
    }

    /// A fetch was attempted; unresolved fields after this mean the fork has no usable parent.
    pub fn topology_attempted(&self) -> bool {
        self.topology_checked_at.is_some()
    }

    pub fn invalidate_topology(&mut self) {
        self.parent_owner = None;
        self.parent_repo_name = None;
        self.default_branch = None;
        self.parent_default_branch = None;
        self.topology_checked_at = None;
    }

    /// Pre-save rule: an active fork always has a cadence, an inactive fork
    /// carries no cadence, drift or pending run.
    pub fn normalize(&mut self) {
        if self.active {
            self.update_frequency.get_or_insert(UpdateFrequency::Daily);
        } else {
            self.update_frequency = None;
            self.behind_by = None;
            self.next_run_at = None;
        }
    }

    pub fn github_url(&self) -> String {
        format!("{GITHUB_WEB}/{}/{}", self.owner, self.repo_name)
    }

    pub fn parent_url(&self) -> Option<String> {
        let owner = self.parent_owner.as_deref()?;
        let repo = self.parent_repo_name.as_deref()?;
        Some(format!("{GITHUB_WEB}/{owner}/{repo}"))
    }

    pub fn comparison_url(&self) -> Option<String> {
        let parent = self.parent_url()?;
        let parent_owner = self.parent_owner.as_deref()?;
        let branch = self.default_branch.as_deref()?;
        let parent_branch = self.parent_default_branch.as_deref()?;
        Some(format!(
            "{parent}/compare/{}:{branch}...{parent_owner}:{parent_branch}",
            self.owner
        ))
    }
}

/// What callers of the public surface see for each fork.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ForkSummary {
    pub owner: String,
    pub repo_name: String,
    pub active: bool,
    pub update_frequency: Option<UpdateFrequency>,
    pub behind_by: Option<u64>,
    pub current: bool,
}

impl ForkSummary {
    pub fn handle(&self) -> ForkHandle {
        ForkHandle::new(self.owner.clone(), self.repo_name.clone())
    }
}
