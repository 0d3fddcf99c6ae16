//! In-process quota store.

use std::collections::HashMap;

use async_trait::async_trait;
use dubify_models::{current_period_key, PlanLimits, PlanTier, QuotaRecord};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::QuotaResult;
use crate::store::{IncrementOutcome, QuotaStore};

/// Quota store backed by a mutex-guarded map.
///
/// Records whose period key is not the current month count as zero usage and
/// restart on the next increment.
pub struct InMemoryQuotaStore {
    default_plan: PlanTier,
    limits: PlanLimits,
    records: Mutex<HashMap<String, QuotaRecord>>,
}

impl InMemoryQuotaStore {
    pub fn new(default_plan: PlanTier) -> Self {
        Self {
            default_plan,
            limits: PlanLimits::default(),
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Use `limits` instead of the default per-plan limits.
    pub fn with_limits(mut self, limits: PlanLimits) -> Self {
        self.limits = limits;
        self
    }

    fn record_for(&self, user_id: &str, plan: PlanTier) -> QuotaRecord {
        QuotaRecord::new(user_id, plan).with_limit(self.limits.limit_for(plan))
    }

    /// Seed or replace a user's plan and usage for the current period.
    pub async fn set_user(&self, user_id: &str, plan: PlanTier, used: u32) {
        let record = self.record_for(user_id, plan).with_used(used);
        self.records.lock().await.insert(user_id.to_string(), record);
    }

    /// Usage in the current period (0 for unknown users).
    pub async fn used(&self, user_id: &str) -> u32 {
        let period = current_period_key();
        self.records
            .lock()
            .await
            .get(user_id)
            .map(|r| r.used_in(&period))
            .unwrap_or(0)
    }

    fn fresh(&self, user_id: &str) -> QuotaRecord {
        self.record_for(user_id, self.default_plan)
    }
}

impl Default for InMemoryQuotaStore {
    fn default() -> Self {
        Self::new(PlanTier::Free)
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn get(&self, user_id: &str) -> QuotaResult<QuotaRecord> {
        let period = current_period_key();
        let records = self.records.lock().await;
        let mut record = records
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| self.fresh(user_id));

        if record.period_key != period {
            record.used_count = 0;
            record.period_key = period;
        }
        Ok(record)
    }

    async fn try_increment(&self, user_id: &str) -> QuotaResult<IncrementOutcome> {
        let period = current_period_key();
        let mut records = self.records.lock().await;
        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| self.record_for(user_id, self.default_plan));

        let period_reset = record.period_key != period;
        let used = record.used_in(&period);

        if used >= record.plan_limit {
            debug!(user_id, used, limit = record.plan_limit, "Quota increment denied");
            return Ok(IncrementOutcome::Denied {
                used,
                limit: record.plan_limit,
            });
        }

        record.used_count = used + 1;
        record.period_key = period;

        info!(
            user_id,
            total_used = record.used_count,
            month_reset = period_reset,
            "Charged dub quota"
        );

        Ok(IncrementOutcome::Charged {
            used_after: record.used_count,
            limit: record.plan_limit,
            period_reset,
        })
    }
}
