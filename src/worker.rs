use crate::clock::Clock;
use crate::host::HostApi;
use crate::jobs::JobQueue;
use crate::service::ForkService;
use crate::store::ForkStore;
use std::time::Duration;
use tracing::{error, info, warn};

const MIN_POLL_SECS: u64 = 5;

fn poll_interval(configured: u64) -> u64 {
    if configured < MIN_POLL_SECS {
        warn!(configured, used = MIN_POLL_SECS, "worker_poll_secs too small");
        return MIN_POLL_SECS;
    }
    configured
}

/// Drains due reconciliation jobs every `interval_secs` until Ctrl-C.
pub async fn run_worker<H: HostApi, S: ForkStore, C: Clock>(
    service: &ForkService<H, S, JobQueue, C>,
    interval_secs: u64,
) {
    let secs = poll_interval(interval_secs);
    let mut interval = tokio::time::interval(Duration::from_secs(secs));
    let queued = service.runner().pending().map(|jobs| jobs.len()).unwrap_or(0);
    info!(interval_secs = secs, queued, "worker started");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("worker stopping");
                break;
            }
        }

        match service.run_due_jobs().await {
            Ok(report) if report.ran + report.skipped + report.failed > 0 => {
                info!(
                    ran = report.ran,
                    skipped = report.skipped,
                    failed = report.failed,
                    dropped = report.dropped,
                    "drained reconciliation jobs"
                );
            }
            Ok(_) => {}
            Err(e) => error!("job queue error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_has_a_floor() {
        assert_eq!(poll_interval(0), MIN_POLL_SECS);
        assert_eq!(poll_interval(4), MIN_POLL_SECS);
        assert_eq!(poll_interval(60), 60);
    }
}
