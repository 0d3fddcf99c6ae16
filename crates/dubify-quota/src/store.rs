//! Quota store boundary.

use async_trait::async_trait;
use dubify_models::QuotaRecord;

use crate::error::QuotaResult;

/// Result of an atomic increment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// Usage was incremented.
    Charged {
        /// Total used this period after the charge
        used_after: u32,
        limit: u32,
        /// The stored period was stale and the counter restarted
        period_reset: bool,
    },
    /// The user was already at their limit; usage unchanged.
    Denied { used: u32, limit: u32 },
}

impl IncrementOutcome {
    pub fn is_charged(&self) -> bool {
        matches!(self, IncrementOutcome::Charged { .. })
    }
}

/// Persistence for per-user plan limits and usage.
///
/// Implementations must make `try_increment` atomic per user: two concurrent
/// increments at `limit - 1` must not both succeed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Current record for a user. Unknown users get a fresh record on the
    /// default plan.
    async fn get(&self, user_id: &str) -> QuotaResult<QuotaRecord>;

    /// Increment usage by one if it is below the plan limit for the current
    /// period.
    async fn try_increment(&self, user_id: &str) -> QuotaResult<IncrementOutcome>;
}
