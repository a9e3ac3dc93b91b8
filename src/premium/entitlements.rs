//! Feature limits and gating.
//!
//! Translates premium status into concrete limits for gated features. The
//! only input is `is_premium`; trial access is decided separately by
//! [`TrialAccessResolver`](super::trial::TrialAccessResolver).

use serde::{Deserialize, Serialize};

use super::clock::Clock;
use super::error::EntitlementError;
use super::status::PremiumStatusResolver;
use super::storage::{MomentsStore, PartnershipStore, ProfileStore};

/// Photo ceiling for free couples.
pub const FREE_MOMENTS_LIMIT: u32 = 10;

/// Days of session history for free accounts.
pub const FREE_HISTORY_DAYS: u32 = 7;

/// Days of session history for premium accounts.
pub const PREMIUM_HISTORY_DAYS: u32 = 365;

/// Ceiling on the number of moments a couple may keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentsLimit {
    Limited(u32),
    Unbounded,
}

impl MomentsLimit {
    /// Check if one more moment fits when `current` already exist.
    #[must_use]
    pub fn allows_another(&self, current: u64) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Limited(limit) => current < u64::from(*limit),
        }
    }

    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

/// Haptic pulse patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PulsePattern {
    Heartbeat,
    Flutter,
    Steady,
    Excited,
    Calm,
}

impl PulsePattern {
    /// The full catalogue, in display order.
    pub const ALL: [PulsePattern; 5] = [
        Self::Heartbeat,
        Self::Flutter,
        Self::Steady,
        Self::Excited,
        Self::Calm,
    ];

    /// The single pattern available without premium.
    pub const BASIC: PulsePattern = Self::Heartbeat;

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Flutter => "flutter",
            Self::Steady => "steady",
            Self::Excited => "excited",
            Self::Calm => "calm",
        }
    }
}

/// Boolean premium capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumCapability {
    PlanTemplates,
    BonusSessionPacks,
    ExtendedMoments,
    CustomPulsePatterns,
}

/// Concrete limits for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureLimits {
    pub moments_limit: MomentsLimit,
    pub sessions_history_days: u32,
    pub pulse_patterns: Vec<PulsePattern>,
    pub plan_templates_enabled: bool,
    pub bonus_session_packs_enabled: bool,
    pub extended_moments_enabled: bool,
    pub custom_pulse_patterns_enabled: bool,
}

impl FeatureLimits {
    /// Limits for accounts without premium.
    #[must_use]
    pub fn free(moments_limit: u32) -> Self {
        Self {
            moments_limit: MomentsLimit::Limited(moments_limit),
            sessions_history_days: FREE_HISTORY_DAYS,
            pulse_patterns: vec![PulsePattern::BASIC],
            plan_templates_enabled: false,
            bonus_session_packs_enabled: false,
            extended_moments_enabled: false,
            custom_pulse_patterns_enabled: false,
        }
    }

    /// Limits for premium accounts.
    #[must_use]
    pub fn premium() -> Self {
        Self {
            moments_limit: MomentsLimit::Unbounded,
            sessions_history_days: PREMIUM_HISTORY_DAYS,
            pulse_patterns: PulsePattern::ALL.to_vec(),
            plan_templates_enabled: true,
            bonus_session_packs_enabled: true,
            extended_moments_enabled: true,
            custom_pulse_patterns_enabled: true,
        }
    }

    /// Check if a capability is enabled.
    #[must_use]
    pub fn allows(&self, capability: PremiumCapability) -> bool {
        match capability {
            PremiumCapability::PlanTemplates => self.plan_templates_enabled,
            PremiumCapability::BonusSessionPacks => self.bonus_session_packs_enabled,
            PremiumCapability::ExtendedMoments => self.extended_moments_enabled,
            PremiumCapability::CustomPulsePatterns => self.custom_pulse_patterns_enabled,
        }
    }
}

/// A row on the upgrade screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumFeature {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub free_value: &'static str,
    pub premium_value: &'static str,
}

/// What premium adds, for display.
pub const PREMIUM_FEATURES: &[PremiumFeature] = &[
    PremiumFeature {
        id: "bonus_sessions",
        title: "Bonus Session Packs",
        description: "Gratitude, reflection, adventure, and more",
        free_value: "1 pack",
        premium_value: "All 8 packs",
    },
    PremiumFeature {
        id: "plan_templates",
        title: "Premium Plan Templates",
        description: "Date ideas with reminders",
        free_value: "Basic only",
        premium_value: "50+ templates",
    },
    PremiumFeature {
        id: "extended_moments",
        title: "Extended Moments",
        description: "Unlimited storage & filters",
        free_value: "10 photos",
        premium_value: "Unlimited",
    },
    PremiumFeature {
        id: "custom_pulse",
        title: "Custom Pulse Patterns",
        description: "Unique haptic rhythms",
        free_value: "1 pattern",
        premium_value: "5+ patterns",
    },
];

/// Result of a moments-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[must_use]
pub struct MomentsLimitCheck {
    pub allowed: bool,
    pub current: u64,
    pub limit: MomentsLimit,
    pub is_premium: bool,
}

/// Maps premium status to feature limits.
pub struct FeatureGate<S, C> {
    store: S,
    premium: PremiumStatusResolver<S, C>,
    free_moments_limit: u32,
}

impl<S, C> FeatureGate<S, C>
where
    S: ProfileStore + PartnershipStore + MomentsStore + Clone,
    C: Clock,
{
    /// Create a new feature gate.
    #[must_use]
    pub fn new(store: S, clock: C) -> Self {
        Self {
            premium: PremiumStatusResolver::new(store.clone(), clock),
            store,
            free_moments_limit: FREE_MOMENTS_LIMIT,
        }
    }

    /// Set the photo ceiling for free couples.
    #[must_use]
    pub fn with_free_moments_limit(mut self, limit: u32) -> Self {
        self.free_moments_limit = limit;
        self
    }

    /// Limits for a given premium flag.
    #[must_use]
    pub fn limits_for(&self, is_premium: bool) -> FeatureLimits {
        if is_premium {
            FeatureLimits::premium()
        } else {
            FeatureLimits::free(self.free_moments_limit)
        }
    }

    /// Get the feature limits for an account.
    ///
    /// Inherits the fail-closed policy of [`PremiumStatusResolver`]: a read
    /// failure yields free limits.
    pub async fn get_feature_limits(&self, account_id: &str) -> FeatureLimits {
        let is_premium = self.premium.is_premium(account_id).await;
        self.limits_for(is_premium)
    }

    /// Check if a premium capability is enabled for an account.
    pub async fn check_feature_access(&self, account_id: &str, capability: PremiumCapability) -> bool {
        self.get_feature_limits(account_id).await.allows(capability)
    }

    /// Pulse patterns available to an account.
    pub async fn get_available_pulse_patterns(&self, account_id: &str) -> Vec<PulsePattern> {
        self.get_feature_limits(account_id).await.pulse_patterns
    }

    /// Check if the couple may add one more moment.
    ///
    /// The count is scoped to the partnership, not the account. When
    /// `partnership_id` is `None` the account's most recent active
    /// partnership is used; with no partnership at all, adding is allowed.
    pub async fn check_moments_limit(
        &self,
        account_id: &str,
        partnership_id: Option<&str>,
    ) -> Result<MomentsLimitCheck, EntitlementError> {
        let is_premium = self.premium.is_premium(account_id).await;
        let limit = self.limits_for(is_premium).moments_limit;

        let partnership_id = match partnership_id {
            Some(id) => id.to_string(),
            None => match self.premium.partners().latest_active_partnership(account_id).await? {
                Some(partnership) => partnership.id,
                None => {
                    return Ok(MomentsLimitCheck {
                        allowed: true,
                        current: 0,
                        limit: MomentsLimit::Limited(self.free_moments_limit),
                        is_premium,
                    });
                }
            },
        };

        let current = self.store.count_moments(&partnership_id).await?;

        Ok(MomentsLimitCheck {
            allowed: limit.allows_another(current),
            current,
            limit,
            is_premium,
        })
    }

    /// The premium status resolver this gate consults.
    pub fn premium(&self) -> &PremiumStatusResolver<S, C> {
        &self.premium
    }
}
