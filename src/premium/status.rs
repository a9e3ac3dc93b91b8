//! Premium status resolution.
//!
//! One subscription covers a couple: an account is premium when its own
//! grant is valid, or when its partner's own grant is valid. The check is
//! symmetric because the partner side is always re-read, no matter which
//! account bought the subscription.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::clock::Clock;
use super::error::StoreError;
use super::partner::PartnerResolver;
use super::plans::PremiumPlan;
use super::storage::{EntitlementRecord, PartnershipStore, ProfileStore};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// How a resolver answers when its reads fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFailurePolicy {
    /// Deny access and report the same result as a genuine "no".
    FailClosed,
    /// Deny access with a result the caller can tell apart from a genuine
    /// "no", so it can offer a retry instead of an upsell.
    FailClosedDistinguishable,
}

/// Where an account's premium access comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PremiumSource {
    /// The account's own purchase.
    #[serde(rename = "self")]
    Own,
    /// The linked partner's purchase.
    #[serde(rename = "partner")]
    Partner,
}

/// Premium status of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[must_use]
pub struct PremiumStatus {
    pub is_premium: bool,
    pub source: Option<PremiumSource>,
    pub plan: Option<PremiumPlan>,
    pub since: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
    /// Set when premium is inherited from the partner.
    pub partner_name: Option<String>,
}

impl PremiumStatus {
    /// Status for an account without premium access.
    pub fn none() -> Self {
        Self {
            is_premium: false,
            source: None,
            plan: None,
            since: None,
            expires: None,
            partner_name: None,
        }
    }

    fn from_record(record: &EntitlementRecord, source: PremiumSource) -> Self {
        Self {
            is_premium: true,
            source: Some(source),
            plan: record.premium_plan,
            since: record.premium_granted_at,
            expires: record.premium_expires_at,
            partner_name: match source {
                PremiumSource::Own => None,
                PremiumSource::Partner => record.display_name.clone(),
            },
        }
    }

    /// Check if premium access comes from the partner.
    #[must_use]
    pub fn is_inherited(&self) -> bool {
        self.source == Some(PremiumSource::Partner)
    }
}

/// Resolves premium status for an account.
pub struct PremiumStatusResolver<S, C> {
    store: S,
    partners: PartnerResolver<S>,
    clock: C,
}

impl<S, C> PremiumStatusResolver<S, C>
where
    S: ProfileStore + PartnershipStore + Clone,
    C: Clock,
{
    /// Read failures deny premium and look like "not premium".
    pub const READ_FAILURE_POLICY: ReadFailurePolicy = ReadFailurePolicy::FailClosed;

    /// Create a new premium status resolver.
    #[must_use]
    pub fn new(store: S, clock: C) -> Self {
        Self {
            partners: PartnerResolver::new(store.clone()),
            store,
            clock,
        }
    }

    /// Get the premium status for an account.
    ///
    /// Never fails: any read error resolves to [`PremiumStatus::none`] and
    /// is logged.
    pub async fn get_premium_status(&self, account_id: &str) -> PremiumStatus {
        match self.try_get_premium_status(account_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(
                    target: "lovelink::premium",
                    account_id = %account_id,
                    error = %e,
                    policy = ?Self::READ_FAILURE_POLICY,
                    "Premium status read failed, denying premium"
                );
                PremiumStatus::none()
            }
        }
    }

    /// Get the premium status, propagating read errors.
    pub async fn try_get_premium_status(
        &self,
        account_id: &str,
    ) -> Result<PremiumStatus, StoreError> {
        let now = self.clock.now();

        // Self first; the partner lookup only runs when this misses.
        if let Some(own) = self.store.get_entitlement(account_id).await? {
            if own.is_premium_valid_at(now) {
                return Ok(PremiumStatus::from_record(&own, PremiumSource::Own));
            }
        }

        let Some(partner_id) = self.partners.resolve_partner_id(account_id).await? else {
            return Ok(PremiumStatus::none());
        };

        match self.store.get_entitlement(&partner_id).await? {
            Some(partner) if partner.is_premium_valid_at(now) => {
                Ok(PremiumStatus::from_record(&partner, PremiumSource::Partner))
            }
            _ => Ok(PremiumStatus::none()),
        }
    }

    /// Check if an account has premium access.
    pub async fn is_premium(&self, account_id: &str) -> bool {
        self.get_premium_status(account_id).await.is_premium
    }

    /// The partner resolver used by this resolver.
    pub fn partners(&self) -> &PartnerResolver<S> {
        &self.partners
    }

    /// The clock used by this resolver.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

/// Human-facing summary of a premium expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryLabel {
    Never,
    Expired,
    ExpiresToday,
    ExpiresTomorrow,
    ExpiresInDays(i64),
    ExpiresOn(NaiveDate),
}

impl fmt::Display for ExpiryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => write!(f, "Never"),
            Self::Expired => write!(f, "Expired"),
            Self::ExpiresToday => write!(f, "Expires today"),
            Self::ExpiresTomorrow => write!(f, "Expires tomorrow"),
            Self::ExpiresInDays(days) => write!(f, "Expires in {} days", days),
            Self::ExpiresOn(date) => write!(f, "Expires {}", date.format("%Y-%m-%d")),
        }
    }
}

/// Summarize when a premium grant expires, relative to `now`.
///
/// Days left are rounded up, so anything later today that is still in the
/// future counts as one day.
pub fn format_premium_expiry(expires: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ExpiryLabel {
    let Some(expires) = expires else {
        return ExpiryLabel::Never;
    };

    let days_left = ceil_days((expires - now).num_milliseconds());

    match days_left {
        d if d < 0 => ExpiryLabel::Expired,
        0 => ExpiryLabel::ExpiresToday,
        1 => ExpiryLabel::ExpiresTomorrow,
        d if d <= 7 => ExpiryLabel::ExpiresInDays(d),
        _ => ExpiryLabel::ExpiresOn(expires.date_naive()),
    }
}

/// Whole days covering `millis`, rounded toward positive infinity.
pub(crate) fn ceil_days(millis: i64) -> i64 {
    millis.div_euclid(MILLIS_PER_DAY) + i64::from(millis.rem_euclid(MILLIS_PER_DAY) != 0)
}
