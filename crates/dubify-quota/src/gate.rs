//! Admission control against monthly plan limits.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::QuotaResult;
use crate::store::{IncrementOutcome, QuotaStore};

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Denied(String),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Reads plan usage before a job starts and charges it once the provider
/// accepts the submission.
#[derive(Clone)]
pub struct QuotaGate {
    store: Arc<dyn QuotaStore>,
}

impl QuotaGate {
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self { store }
    }

    /// Check whether the user has capacity left this period. Never mutates
    /// usage.
    pub async fn admit(&self, user_id: &str) -> QuotaResult<Admission> {
        let record = self.store.get(user_id).await?;
        let period = dubify_models::current_period_key();

        if record.has_capacity_in(&period) {
            Ok(Admission::Allowed {
                remaining: record.remaining_in(&period),
            })
        } else {
            info!(
                user_id,
                plan = %record.plan,
                used = record.used_in(&period),
                limit = record.plan_limit,
                "Admission denied"
            );
            Ok(Admission::Denied(format!(
                "Monthly dub limit reached ({}/{} on {} plan)",
                record.used_in(&period),
                record.plan_limit,
                record.plan
            )))
        }
    }

    /// Charge one dub against the user's quota.
    ///
    /// Returns `Denied` when a concurrent consumer used up the remaining
    /// capacity since `admit`.
    pub async fn record_submission(&self, user_id: &str) -> QuotaResult<Admission> {
        match self.store.try_increment(user_id).await? {
            IncrementOutcome::Charged {
                used_after, limit, ..
            } => Ok(Admission::Allowed {
                remaining: limit.saturating_sub(used_after),
            }),
            IncrementOutcome::Denied { used, limit } => {
                warn!(user_id, used, limit, "Quota exhausted between admission and submission");
                Ok(Admission::Denied(format!(
                    "Monthly dub limit reached ({}/{})",
                    used, limit
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuotaError;
    use crate::store::MockQuotaStore;
    use dubify_models::{PlanTier, QuotaRecord};

    fn record(plan: PlanTier, used: u32) -> QuotaRecord {
        QuotaRecord::new("user_1", plan).with_used(used)
    }

    #[tokio::test]
    async fn test_admit_with_capacity() {
        let mut store = MockQuotaStore::new();
        store
            .expect_get()
            .returning(|_| Ok(record(PlanTier::Starter, 3)));
        store.expect_try_increment().never();

        let gate = QuotaGate::new(Arc::new(store));
        let admission = gate.admit("user_1").await.unwrap();
        assert_eq!(admission, Admission::Allowed { remaining: 7 });
    }

    #[tokio::test]
    async fn test_admit_at_limit_is_denied_without_increment() {
        let mut store = MockQuotaStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|_| Ok(record(PlanTier::Free, 1)));
        store.expect_try_increment().never();

        let gate = QuotaGate::new(Arc::new(store));
        let admission = gate.admit("user_1").await.unwrap();
        assert!(!admission.is_allowed());
        match admission {
            Admission::Denied(reason) => assert!(reason.contains("limit reached")),
            other => panic!("unexpected admission {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_record_submission_charges_once() {
        let mut store = MockQuotaStore::new();
        store.expect_try_increment().times(1).returning(|_| {
            Ok(IncrementOutcome::Charged {
                used_after: 4,
                limit: 10,
                period_reset: false,
            })
        });
        store.expect_get().never();

        let gate = QuotaGate::new(Arc::new(store));
        let admission = gate.record_submission("user_1").await.unwrap();
        assert_eq!(admission, Admission::Allowed { remaining: 6 });
    }

    #[tokio::test]
    async fn test_record_submission_refused() {
        let mut store = MockQuotaStore::new();
        store
            .expect_try_increment()
            .returning(|_| Ok(IncrementOutcome::Denied { used: 10, limit: 10 }));

        let gate = QuotaGate::new(Arc::new(store));
        let admission = gate.record_submission("user_1").await.unwrap();
        assert!(matches!(admission, Admission::Denied(_)));
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let mut store = MockQuotaStore::new();
        store
            .expect_get()
            .returning(|_| Err(QuotaError::unavailable("connection refused")));

        let gate = QuotaGate::new(Arc::new(store));
        let err = gate.admit("user_1").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
