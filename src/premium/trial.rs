//! Free-trial access.
//!
//! Every account gets gated features for a fixed window after creation. An
//! administrative bypass flag extends that access indefinitely, and premium
//! access (own or inherited) makes the trial irrelevant.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::clock::Clock;
use super::error::StoreError;
use super::status::{PremiumStatusResolver, ReadFailurePolicy, ceil_days};
use super::storage::{PartnershipStore, ProfileStore, TrialColumns, TrialProfile};

/// Length of the free trial, in days.
pub const TRIAL_DAYS: u32 = 7;

/// Profile column holding the trial bypass flag.
pub const TRIAL_BYPASS_COLUMN: &str = "trial_access_bypass";

/// Why an account does or does not have access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialReason {
    Premium,
    Bypass,
    Trial,
    Expired,
    /// Access could not be verified. Not the same as an expired trial.
    Error,
}

impl TrialReason {
    /// Convert to the string form used in logs and payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Premium => "premium",
            Self::Bypass => "bypass",
            Self::Trial => "trial",
            Self::Expired => "expired",
            Self::Error => "error",
        }
    }
}

/// Trial access status of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[must_use]
pub struct TrialAccessStatus {
    pub has_access: bool,
    pub is_premium: bool,
    pub is_in_trial: bool,
    /// `None` when the trial does not apply (premium or bypass).
    pub days_remaining: Option<u32>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub reason: TrialReason,
}

impl TrialAccessStatus {
    fn premium() -> Self {
        Self {
            has_access: true,
            is_premium: true,
            is_in_trial: false,
            days_remaining: None,
            trial_ends_at: None,
            reason: TrialReason::Premium,
        }
    }

    fn bypass() -> Self {
        Self {
            has_access: true,
            is_premium: false,
            is_in_trial: false,
            days_remaining: None,
            trial_ends_at: None,
            reason: TrialReason::Bypass,
        }
    }

    fn error() -> Self {
        Self {
            has_access: false,
            is_premium: false,
            is_in_trial: false,
            days_remaining: Some(0),
            trial_ends_at: None,
            reason: TrialReason::Error,
        }
    }
}

/// Check whether a store error only means the bypass column is not deployed.
///
/// This is the one place that decides a trial read failure is a benign
/// schema-evolution signal. Everything else is terminal.
#[must_use]
pub fn is_missing_bypass_column(error: &StoreError) -> bool {
    match error {
        StoreError::MissingColumn { column } => column.is_empty() || column == TRIAL_BYPASS_COLUMN,
        _ => false,
    }
}

/// App features, split into gated and always-available ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppFeature {
    DailySession,
    Moments,
    Pulse,
    Plans,
    Home,
    PartnerLink,
    Settings,
    Premium,
}

/// Features that require trial or premium access.
pub const GATED_FEATURES: &[AppFeature] = &[
    AppFeature::DailySession,
    AppFeature::Moments,
    AppFeature::Pulse,
    AppFeature::Plans,
];

impl AppFeature {
    /// Check if this feature consults trial access.
    #[must_use]
    pub fn is_gated(&self) -> bool {
        GATED_FEATURES.contains(self)
    }

    /// Convert to the string form used in logs and payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailySession => "daily_session",
            Self::Moments => "moments",
            Self::Pulse => "pulse",
            Self::Plans => "plans",
            Self::Home => "home",
            Self::PartnerLink => "partner_link",
            Self::Settings => "settings",
            Self::Premium => "premium",
        }
    }
}

/// Answer to "may this account open this feature?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureAccess {
    /// The feature is never gated.
    Ungated,
    /// Access granted for the given reason.
    Granted(TrialReason),
    /// Access denied. [`TrialReason::Error`] means "try again", anything
    /// else means "upgrade".
    Denied(TrialReason),
}

impl FeatureAccess {
    /// Check if the feature may be used.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied(_))
    }
}

/// Resolves trial access for an account.
pub struct TrialAccessResolver<S, C> {
    store: S,
    premium: PremiumStatusResolver<S, C>,
    trial_days: u32,
}

impl<S, C> TrialAccessResolver<S, C>
where
    S: ProfileStore + PartnershipStore + Clone,
    C: Clock,
{
    /// Read failures deny access with [`TrialReason::Error`].
    pub const READ_FAILURE_POLICY: ReadFailurePolicy = ReadFailurePolicy::FailClosedDistinguishable;

    /// Create a new trial access resolver with the default trial length.
    #[must_use]
    pub fn new(store: S, clock: C) -> Self {
        Self {
            premium: PremiumStatusResolver::new(store.clone(), clock),
            store,
            trial_days: TRIAL_DAYS,
        }
    }

    /// Set the trial length in days.
    #[must_use]
    pub fn with_trial_days(mut self, days: u32) -> Self {
        self.trial_days = days;
        self
    }

    /// The configured trial length in days.
    #[must_use]
    pub fn trial_days(&self) -> u32 {
        self.trial_days
    }

    /// Get the trial access status for an account.
    pub async fn get_trial_access_status(&self, account_id: &str) -> TrialAccessStatus {
        if self.premium.is_premium(account_id).await {
            return TrialAccessStatus::premium();
        }

        let profile = match self.load_trial_profile(account_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::warn!(
                    target: "lovelink::premium",
                    account_id = %account_id,
                    policy = ?Self::READ_FAILURE_POLICY,
                    "No profile for trial check, denying access"
                );
                return TrialAccessStatus::error();
            }
            Err(e) => {
                tracing::warn!(
                    target: "lovelink::premium",
                    account_id = %account_id,
                    error = %e,
                    policy = ?Self::READ_FAILURE_POLICY,
                    "Trial profile read failed, denying access"
                );
                return TrialAccessStatus::error();
            }
        };

        if profile.trial_access_bypass {
            return TrialAccessStatus::bypass();
        }

        let now = self.premium.clock().now();
        self.window_status(account_id, profile.account_created_at.unwrap_or(now), now)
    }

    /// Decide access to a single feature.
    pub async fn check_feature(&self, account_id: &str, feature: AppFeature) -> FeatureAccess {
        if !feature.is_gated() {
            return FeatureAccess::Ungated;
        }

        let status = self.get_trial_access_status(account_id).await;
        if status.has_access {
            FeatureAccess::Granted(status.reason)
        } else {
            tracing::debug!(
                target: "lovelink::premium",
                account_id = %account_id,
                feature = feature.as_str(),
                reason = status.reason.as_str(),
                "Gated feature denied"
            );
            FeatureAccess::Denied(status.reason)
        }
    }

    /// The premium status resolver this resolver consults first.
    pub fn premium(&self) -> &PremiumStatusResolver<S, C> {
        &self.premium
    }

    async fn load_trial_profile(&self, account_id: &str) -> Result<Option<TrialProfile>, StoreError> {
        match self
            .store
            .get_trial_profile(account_id, TrialColumns::WithBypass)
            .await
        {
            Err(e) if is_missing_bypass_column(&e) => {
                tracing::debug!(
                    target: "lovelink::premium",
                    account_id = %account_id,
                    "Bypass column missing, reading created_at only"
                );
                let profile = self
                    .store
                    .get_trial_profile(account_id, TrialColumns::CreatedAtOnly)
                    .await?;
                Ok(profile.map(|p| TrialProfile {
                    trial_access_bypass: false,
                    ..p
                }))
            }
            other => other,
        }
    }

    fn window_status(
        &self,
        account_id: &str,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> TrialAccessStatus {
        let Some(trial_ends_at) = Duration::try_days(i64::from(self.trial_days))
            .and_then(|length| created_at.checked_add_signed(length))
        else {
            tracing::warn!(
                target: "lovelink::premium",
                account_id = %account_id,
                trial_days = self.trial_days,
                policy = ?Self::READ_FAILURE_POLICY,
                "Trial end is out of range, denying access"
            );
            return TrialAccessStatus::error();
        };

        if now < trial_ends_at {
            let days = ceil_days((trial_ends_at - now).num_milliseconds());
            TrialAccessStatus {
                has_access: true,
                is_premium: false,
                is_in_trial: true,
                days_remaining: Some(u32::try_from(days).unwrap_or(self.trial_days)),
                trial_ends_at: Some(trial_ends_at),
                reason: TrialReason::Trial,
            }
        } else {
            TrialAccessStatus {
                has_access: false,
                is_premium: false,
                is_in_trial: false,
                days_remaining: Some(0),
                trial_ends_at: Some(trial_ends_at),
                reason: TrialReason::Expired,
            }
        }
    }
}
