//! Worker configuration.

use std::net::SocketAddr;

use dubify_models::{PlanLimits, PlanTier};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Plan assigned to every user in the batch
    pub user_plan: PlanTier,
    /// Dubs already used this month by every user in the batch
    pub user_used: u32,
    /// Monthly limit per plan, overridable with `DUBIFY_LIMIT_<PLAN>`
    pub plan_limits: PlanLimits,
    /// Prometheus listener address; metrics are disabled when unset
    pub metrics_addr: Option<SocketAddr>,
    /// Emit JSON logs instead of ANSI text
    pub log_json: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            user_plan: PlanTier::Free,
            user_used: 0,
            plan_limits: PlanLimits::default(),
            metrics_addr: None,
            log_json: false,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            user_plan: std::env::var("DUBIFY_USER_PLAN")
                .map(|p| PlanTier::from_str(&p))
                .unwrap_or_default(),
            user_used: std::env::var("DUBIFY_USER_USED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            plan_limits: limits_from_env(),
            metrics_addr: std::env::var("METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
            log_json: std::env::var("LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
        }
    }
}

fn limits_from_env() -> PlanLimits {
    let defaults = PlanLimits::default();
    let limit = |name: &str, default: u32| {
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    };
    PlanLimits {
        free: limit("DUBIFY_LIMIT_FREE", defaults.free),
        starter: limit("DUBIFY_LIMIT_STARTER", defaults.starter),
        advanced: limit("DUBIFY_LIMIT_ADVANCED", defaults.advanced),
        professional: limit("DUBIFY_LIMIT_PROFESSIONAL", defaults.professional),
    }
}
