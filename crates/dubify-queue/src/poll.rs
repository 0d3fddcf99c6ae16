//! Bounded, cancellable provider polling.

use std::time::Duration;

use dubify_provider::{DubProvider, ProviderStatus};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::logging::JobLogger;
use crate::metrics;

/// Polling cadence and bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed delay between status checks
    pub interval: Duration,
    /// Status checks before giving up
    pub max_attempts: u32,
    /// Optional wall-clock budget for the whole polling phase
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 360,
            deadline: None,
        }
    }
}

/// How polling ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready { attempts: u32 },
    ProviderFailed(String),
    TimedOut { attempts: u32 },
    Interrupted,
}

/// Poll until the provider job is terminal, the budget runs out or shutdown
/// is signalled.
///
/// Transient errors (network, rate limiting, 5xx) count as an attempt and are
/// retried on the same interval. Permanent errors end polling as a provider
/// failure.
pub async fn poll_until_terminal(
    provider: &dyn DubProvider,
    provider_job_id: &str,
    policy: &PollPolicy,
    shutdown: &mut watch::Receiver<bool>,
    logger: &JobLogger,
) -> PollOutcome {
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        if *shutdown.borrow() {
            return PollOutcome::Interrupted;
        }

        attempts += 1;
        match provider.poll_status(provider_job_id).await {
            Ok(ProviderStatus::Ready) => {
                metrics::record_poll_attempt("ready");
                return PollOutcome::Ready { attempts };
            }
            Ok(ProviderStatus::Failed(message)) => {
                metrics::record_poll_attempt("failed");
                return PollOutcome::ProviderFailed(message);
            }
            Ok(ProviderStatus::Pending) => {
                metrics::record_poll_attempt("pending");
            }
            Err(e) if e.is_retryable() => {
                metrics::record_poll_attempt("error");
                logger.status_check_failed(attempts, &e);
            }
            Err(e) => {
                metrics::record_poll_attempt("error");
                return PollOutcome::ProviderFailed(e.to_string());
            }
        }

        if attempts >= policy.max_attempts {
            return PollOutcome::TimedOut { attempts };
        }

        let mut wait = policy.interval;
        if let Some(deadline) = policy.deadline {
            let elapsed = started.elapsed();
            if elapsed >= deadline {
                return PollOutcome::TimedOut { attempts };
            }
            wait = wait.min(deadline - elapsed);
        }

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return PollOutcome::Interrupted;
                }
            }
        }
    }
}
