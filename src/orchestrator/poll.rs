//! Job status poll loop.

use super::machine::PollEvent;
use crate::backend::Backend;
use crate::model::{JobState, JobStatus};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 60,
        }
    }
}

/// Poll `job_id` until it resolves, fails, or runs out of attempts.
///
/// The first status request goes out one interval after the call. Ticks never
/// overlap: a slow response delays the next tick. The attempt ceiling is
/// checked after each tick's work, so a job resolving on the last allowed tick
/// is still honoured. Non-terminal statuses are handed to `on_progress`.
pub async fn poll_job<B, F>(
    backend: &B,
    job_id: &str,
    cfg: PollConfig,
    mut on_progress: F,
) -> PollEvent
where
    B: Backend + ?Sized,
    F: FnMut(u32, &JobStatus),
{
    let max_attempts = cfg.max_attempts.max(1);
    let mut ticker = tokio::time::interval_at(Instant::now() + cfg.interval, cfg.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempts = 0u32;

    loop {
        ticker.tick().await;

        let status = match backend.status(job_id).await {
            Ok(s) => s,
            Err(e) => return PollEvent::Transport(e),
        };
        attempts += 1;

        match status.state() {
            JobState::Ready => {
                tracing::info!(job_id, attempts, "job ready");
                return PollEvent::Ready {
                    url: backend.media_url(status.url.as_deref(), job_id),
                    download_url: backend.download_url(job_id),
                };
            }
            JobState::Failed => {
                tracing::info!(job_id, attempts, error = ?status.error, "job failed");
                return PollEvent::Failed {
                    error: status.error,
                };
            }
            state => {
                tracing::debug!(job_id, attempts, status = state.label(), "job pending");
                on_progress(attempts, &status);
            }
        }

        if attempts >= max_attempts {
            return PollEvent::TimedOut { attempts };
        }
    }
}
