//! Queue configuration.

use std::time::Duration;

use crate::poll::PollPolicy;

/// Queue and executor configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub poll: PollPolicy,
    /// Buffered lifecycle events per subscriber before it starts lagging
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            event_capacity: 256,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = PollPolicy::default();
        Self {
            poll: PollPolicy {
                interval: Duration::from_secs(
                    std::env::var("DUB_POLL_INTERVAL_SECS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.interval.as_secs()),
                ),
                max_attempts: std::env::var("DUB_POLL_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.max_attempts),
                deadline: std::env::var("DUB_POLL_DEADLINE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .map(Duration::from_secs),
            },
            event_capacity: std::env::var("DUB_EVENT_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(256),
        }
    }
}
