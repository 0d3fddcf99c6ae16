//! Per-user quota records.

use chrono::{DateTime, Datelike, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::plan::PlanTier;

/// Usage period key in "YYYY-MM" format for the current month.
pub fn current_period_key() -> String {
    period_key_for(Utc::now())
}

/// Usage period key for an arbitrary instant.
pub fn period_key_for(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

/// Admission state for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QuotaRecord {
    pub user_id: String,
    pub plan: PlanTier,
    /// Dubs allowed per period
    pub plan_limit: u32,
    /// Dubs submitted in `period_key`
    pub used_count: u32,
    /// Period the usage counter belongs to
    pub period_key: String,
}

impl QuotaRecord {
    /// Fresh record for the current period.
    pub fn new(user_id: impl Into<String>, plan: PlanTier) -> Self {
        Self {
            user_id: user_id.into(),
            plan,
            plan_limit: plan.monthly_limit(),
            used_count: 0,
            period_key: current_period_key(),
        }
    }

    /// Override the plan's default limit.
    pub fn with_limit(mut self, plan_limit: u32) -> Self {
        self.plan_limit = plan_limit;
        self
    }

    pub fn with_used(mut self, used_count: u32) -> Self {
        self.used_count = used_count;
        self
    }

    /// Usage counted against `period`; a stale period counts as zero.
    pub fn used_in(&self, period: &str) -> u32 {
        if self.period_key == period {
            self.used_count
        } else {
            0
        }
    }

    /// Dubs still available in `period`.
    pub fn remaining_in(&self, period: &str) -> u32 {
        self.plan_limit.saturating_sub(self.used_in(period))
    }

    pub fn has_capacity_in(&self, period: &str) -> bool {
        self.used_in(period) < self.plan_limit
    }
}
