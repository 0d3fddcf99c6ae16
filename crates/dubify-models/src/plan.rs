//! Plan tiers and monthly dub limits.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default monthly dub limits for each plan tier.
///
/// The product only names its plans; these numbers are Dubify defaults and a
/// deployment overrides them through [`PlanLimits`].
pub const FREE_MONTHLY_DUBS: u32 = 1;
pub const STARTER_MONTHLY_DUBS: u32 = 10;
pub const ADVANCED_MONTHLY_DUBS: u32 = 40;
pub const PROFESSIONAL_MONTHLY_DUBS: u32 = 100;

/// Plan tier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Starter,
    Advanced,
    Professional,
}

impl PlanTier {
    /// Parse from string (case-insensitive). Unknown plans fall back to Free.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "starter" => PlanTier::Starter,
            "advanced" => PlanTier::Advanced,
            "professional" | "pro" => PlanTier::Professional,
            _ => PlanTier::Free,
        }
    }

    /// Default number of dubs a user on this plan may submit per month.
    pub fn monthly_limit(&self) -> u32 {
        PlanLimits::default().limit_for(*self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Starter => "starter",
            PlanTier::Advanced => "advanced",
            PlanTier::Professional => "professional",
        }
    }
}

/// Monthly dub limit per plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlanLimits {
    pub free: u32,
    pub starter: u32,
    pub advanced: u32,
    pub professional: u32,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            free: FREE_MONTHLY_DUBS,
            starter: STARTER_MONTHLY_DUBS,
            advanced: ADVANCED_MONTHLY_DUBS,
            professional: PROFESSIONAL_MONTHLY_DUBS,
        }
    }
}

impl PlanLimits {
    pub fn limit_for(&self, plan: PlanTier) -> u32 {
        match plan {
            PlanTier::Free => self.free,
            PlanTier::Starter => self.starter,
            PlanTier::Advanced => self.advanced,
            PlanTier::Professional => self.professional,
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
