mod clock;
mod config;
mod drift;
mod error;
mod fork;
mod host;
mod jobs;
mod registry;
mod scheduler;
mod service;
mod store;
mod sync;
#[cfg(test)]
mod test_utils;
mod topology;
mod worker;

use clap::{Parser, Subcommand};
use clock::SystemClock;
use config::Config;
use error::ForkbombError;
use fork::{ForkHandle, ForkSummary, UpdateFrequency};
use host::GitHubClient;
use jobs::JobQueue;
use service::ForkService;
use std::path::PathBuf;
use store::FileStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "forkbomb", about = "Keeps GitHub forks in step with their upstream parents")]
struct Cli {
    #[arg(long, global = true, help = "Directory holding forks.toml and jobs.toml")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a user's forks with their drift
    Forks {
        #[arg(long, short)]
        user: Option<String>,
    },
    /// Turn automatic upstream pull requests on or off
    Toggle {
        #[arg(value_parser = parse_handle)]
        fork: ForkHandle,
        #[arg(long, short, help = "daily, weekly, monthly or none")]
        frequency: Option<String>,
        #[arg(long, help = "Disable automatic pull requests")]
        off: bool,
    },
    /// Open an upstream pull request now
    Sync {
        #[arg(value_parser = parse_handle)]
        fork: ForkHandle,
    },
    /// Forget and refetch a fork's parent metadata
    Refresh {
        #[arg(value_parser = parse_handle)]
        fork: ForkHandle,
    },
    /// Run scheduled reconciliations until interrupted
    Worker,
}

fn parse_handle(s: &str) -> std::result::Result<ForkHandle, String> {
    s.parse().map_err(|e: ForkbombError| e.to_string())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forkbomb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.data_dir);
    tracing::debug!(?config, "configuration loaded");

    let token = config
        .github_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ForkbombError::Config("GITHUB_TOKEN is not set".to_string()))?;

    let service = ForkService::new(
        GitHubClient::new(token)?,
        FileStore::open(config.forks_path())?,
        JobQueue::open(config.jobs_path())?,
        SystemClock,
        config.policy(),
    );

    match cli.command {
        Command::Forks { user } => {
            let user = user.or_else(|| config.user.clone()).ok_or_else(|| {
                ForkbombError::Config("no user given and none configured".to_string())
            })?;
            for summary in service.sync_for_user(&user).await? {
                println!("{}", format_summary(&summary));
            }
            if let Some(remaining) = service.host().rate_limit().await {
                tracing::debug!(remaining, "github rate limit");
            }
        }
        Command::Toggle {
            fork,
            frequency,
            off,
        } => {
            let (active, frequency) = toggle_request(frequency.as_deref(), off)?;
            let updated = service.toggle_active(&fork, active, frequency)?;
            match (updated.update_frequency, updated.next_run_at) {
                (Some(f), Some(at)) => println!("{fork}: {f}, next run {at}"),
                (Some(f), None) => println!("{fork}: {f}"),
                _ => println!("{fork}: off"),
            }
        }
        Command::Sync { fork } => match service.trigger_manual_sync(&fork).await? {
            Some(url) => println!("{url}"),
            None => println!("{fork}: nothing to sync"),
        },
        Command::Refresh { fork } => {
            let refreshed = service.refresh_topology(&fork).await?;
            match refreshed.parent_url() {
                Some(parent) => println!("{}: fork of {parent}", refreshed.github_url()),
                None => println!("{fork}: no upstream parent"),
            }
            if let Some(compare) = refreshed.comparison_url() {
                println!("{compare}");
            }
        }
        Command::Worker => worker::run_worker(&service, config.worker_poll_secs).await,
    }

    Ok(())
}

/// `--frequency none` switches the fork off just like `--off`.
fn toggle_request(
    frequency: Option<&str>,
    off: bool,
) -> std::result::Result<(bool, Option<UpdateFrequency>), ForkbombError> {
    match frequency {
        Some(f) => match UpdateFrequency::parse_optional(f)? {
            Some(frequency) => Ok((!off, Some(frequency))),
            None => Ok((false, None)),
        },
        None => Ok((!off, None)),
    }
}

fn format_summary(summary: &ForkSummary) -> String {
    let cadence = match summary.update_frequency {
        Some(frequency) if summary.active => frequency.to_string(),
        _ => "off".to_string(),
    };
    let drift = match summary.behind_by {
        _ if summary.current => "current".to_string(),
        Some(n) => format!("{n} behind"),
        None => "-".to_string(),
    };
    format!("{:<40} {:<8} {}", summary.handle().to_string(), cadence, drift)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(active: bool, behind_by: Option<u64>) -> ForkSummary {
        ForkSummary {
            owner: "alice".to_string(),
            repo_name: "tool".to_string(),
            active,
            update_frequency: active.then_some(UpdateFrequency::Daily),
            behind_by,
            current: behind_by == Some(0),
        }
    }

    #[test]
    fn summary_lines() {
        assert!(format_summary(&summary(true, Some(0))).ends_with("daily    current"));
        assert!(format_summary(&summary(true, Some(3))).ends_with("daily    3 behind"));
        assert!(format_summary(&summary(false, None)).ends_with("off      -"));
    }

    #[test]
    fn cli_parses_toggle() {
        let cli =
            Cli::try_parse_from(["forkbomb", "toggle", "alice/tool", "-f", "weekly"]).unwrap();
        match cli.command {
            Command::Toggle { fork, frequency, off } => {
                assert_eq!(fork, ForkHandle::new("alice", "tool"));
                assert_eq!(frequency.as_deref(), Some("weekly"));
                assert!(!off);
            }
            _ => panic!("expected toggle"),
        }
    }

    #[test]
    fn toggle_frequency_none_switches_off() {
        assert_eq!(toggle_request(Some("none"), false).unwrap(), (false, None));
        assert_eq!(toggle_request(Some(""), false).unwrap(), (false, None));
        assert_eq!(
            toggle_request(Some("weekly"), false).unwrap(),
            (true, Some(UpdateFrequency::Weekly))
        );
        assert_eq!(toggle_request(None, false).unwrap(), (true, None));
        assert_eq!(toggle_request(None, true).unwrap(), (false, None));
        assert!(toggle_request(Some("hourly"), false).is_err());
    }

    #[test]
    fn cli_rejects_bad_handle() {
        assert!(Cli::try_parse_from(["forkbomb", "sync", "alice"]).is_err());
    }
}
