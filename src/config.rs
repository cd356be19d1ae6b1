use crate::drift::DEFAULT_STALE_AFTER_HOURS;
use crate::registry::DEFAULT_REFRESH_HOURS;
use crate::service::Policy;
use crate::sync::PrTemplate;
use chrono::Duration;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    pub github_token: Option<String>,
    /// Whose forks `forkbomb forks` lists when no user is given.
    pub user: Option<String>,
    pub data_dir: PathBuf,
    pub worker_poll_secs: u64,
    pub registry_refresh_hours: i64,
    pub drift_stale_hours: i64,
    pub job_retry_secs: i64,
    pub job_max_attempts: u32,
    #[serde(default = "default_pr_title")]
    pub pr_title: String,
    #[serde(default = "default_pr_body")]
    pub pr_body: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("github_token", &self.github_token.as_ref().map(|_| "[REDACTED]"))
            .field("user", &self.user)
            .field("data_dir", &self.data_dir)
            .field("worker_poll_secs", &self.worker_poll_secs)
            .field("registry_refresh_hours", &self.registry_refresh_hours)
            .field("drift_stale_hours", &self.drift_stale_hours)
            .field("job_retry_secs", &self.job_retry_secs)
            .field("job_max_attempts", &self.job_max_attempts)
            .field("pr_title", &self.pr_title)
            .field("pr_body", &self.pr_body)
            .finish()
    }
}

fn default_pr_title() -> String {
    PrTemplate::default().title
}

fn default_pr_body() -> String {
    PrTemplate::default().body
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_token: None,
            user: None,
            data_dir: data_dir(),
            worker_poll_secs: 60,
            registry_refresh_hours: DEFAULT_REFRESH_HOURS,
            drift_stale_hours: DEFAULT_STALE_AFTER_HOURS,
            job_retry_secs: 15 * 60,
            job_max_attempts: 5,
            pr_title: default_pr_title(),
            pr_body: default_pr_body(),
        }
    }
}

impl Config {
    pub fn load(cli_data_dir: Option<PathBuf>) -> Self {
        let config_file = config_dir().join("forkbomb").join("config.toml");
        Self::load_from(&config_file, cli_data_dir)
    }

    pub fn load_from(config_file: &Path, cli_data_dir: Option<PathBuf>) -> Self {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if config_file.exists() {
            figment = figment.merge(Toml::file(config_file));
        }

        figment = figment.merge(Env::prefixed("FORKBOMB_")).merge(
            Env::raw()
                .only(&["GITHUB_TOKEN"])
                .map(|_| "github_token".into()),
        );

        if let Some(path) = cli_data_dir {
            figment = figment.merge(Serialized::default("data_dir", path));
        }

        match figment.extract() {
            Ok(config) => config,
            Err(e) => {
                warn!("config parse error, using defaults: {e}");
                Config::default()
            }
        }
    }

    pub fn forks_path(&self) -> PathBuf {
        self.data_dir.join("forks.toml")
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.data_dir.join("jobs.toml")
    }

    pub fn policy(&self) -> Policy {
        Policy {
            registry_refresh: Duration::hours(self.registry_refresh_hours.max(0)),
            drift_stale_after: Duration::hours(self.drift_stale_hours.max(0)),
            job_retry_delay: Duration::seconds(self.job_retry_secs.max(0)),
            job_max_attempts: self.job_max_attempts.max(1),
            pr: PrTemplate {
                title: self.pr_title.clone(),
                body: self.pr_body.clone(),
            },
        }
    }
}

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".local").join("share"))
        })
        .unwrap_or_else(|| PathBuf::from("."))
        .join("forkbomb")
}
