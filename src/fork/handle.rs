use crate::error::ForkbombError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable external identity of a fork, written as `owner/repo`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ForkHandle {
    pub owner: String,
    pub repo: String,
}

impl ForkHandle {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for ForkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for ForkHandle {
    type Err = ForkbombError;

    // splits at the first slash only, so the owner never contains one
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => {
                Ok(Self::new(owner, repo))
            }
            _ => Err(ForkbombError::InvalidHandle(s.to_string())),
        }
    }
}
