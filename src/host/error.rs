//! Host API errors and their classification.
//!
//! Two separate questions get answered here:
//!
//! - **Kind**: is the failure transient (rate limits, 5xx, network) or
//!   permanent? The engine never retries either; the kind only feeds logging
//!   and the job queue's retry decision.
//! - **Pull request outcome**: GitHub reports "nothing to do" situations on
//!   PR creation as HTTP 422 with a message. [`classify_pr_error`] is the one
//!   place those messages are matched.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorKind {
    Transient,
    Permanent,
}

#[derive(Debug, Error)]
pub struct HostApiError {
    pub kind: HostErrorKind,
    pub status_code: Option<u16>,
    pub message: String,
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for HostApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "HTTP {code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl HostApiError {
    /// Builds an error from a response status and message and decides its kind.
    /// 429, 5xx and rate-limit 403s are transient, as are network failures
    /// that never got a status.
    pub fn from_status(status_code: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = match status_code {
            Some(429) => HostErrorKind::Transient,
            Some(403) if is_rate_limit_message(&message) => HostErrorKind::Transient,
            Some(code) if (500..600).contains(&code) => HostErrorKind::Transient,
            Some(_) => HostErrorKind::Permanent,
            None if is_network_message(&message) => HostErrorKind::Transient,
            None => HostErrorKind::Permanent,
        };

        Self {
            kind,
            status_code,
            message,
            source: None,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == HostErrorKind::Transient
    }

    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let (status_code, message) = match &err {
            octocrab::Error::GitHub { source, .. } => (
                Some(source.status_code.as_u16()),
                with_details(&source.message, source.errors.as_deref().unwrap_or_default()),
            ),
            other => (None, other.to_string()),
        };

        Self {
            source: Some(err),
            ..Self::from_status(status_code, message)
        }
    }
}

/// Validation failures keep the useful text in `errors[].message`.
fn with_details(message: &str, errors: &[serde_json::Value]) -> String {
    let details: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.get("message").and_then(serde_json::Value::as_str))
        .collect();
    if details.is_empty() {
        message.to_string()
    } else {
        format!("{message}: {}", details.join("; "))
    }
}

/// How a failed pull request creation should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrErrorKind {
    /// An open PR for the same head/base already exists.
    AlreadyExists,
    /// Head and base are identical; there is nothing to propose.
    NoCommits,
    Fatal,
}

impl PrErrorKind {
    pub fn is_absorbed(&self) -> bool {
        !matches!(self, PrErrorKind::Fatal)
    }
}

pub fn classify_pr_error(err: &HostApiError) -> PrErrorKind {
    let message = err.message.to_lowercase();
    if message.contains("a pull request already exists") {
        PrErrorKind::AlreadyExists
    } else if message.contains("no commits between") {
        PrErrorKind::NoCommits
    } else {
        PrErrorKind::Fatal
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit") || lower.contains("secondary rate") || lower.contains("abuse")
}

fn is_network_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection")
        || lower.contains("dns")
}
