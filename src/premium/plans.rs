//! Premium plans and subscription products.
//!
//! A plan is the billing cadence (`monthly` or `yearly`); a product is the
//! store SKU that was actually bought. Several historical SKUs map onto the
//! same plan so purchases made under old store configurations still
//! reconcile.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::EntitlementError;

/// Current monthly subscription product.
pub const MONTHLY_PRODUCT_ID: &str = "com.lovelinkcouples.premium.monthly";

/// Current yearly subscription product.
pub const YEARLY_PRODUCT_ID: &str = "com.lovelinkcouples.premium.yearly";

/// Products sold today.
pub const SUBSCRIPTION_PRODUCT_IDS: &[&str] = &[MONTHLY_PRODUCT_ID, YEARLY_PRODUCT_ID];

/// Products from earlier store configurations that must still be honored.
pub const LEGACY_PRODUCT_IDS: &[&str] = &[
    "com.lovelink.premium.monthly",
    "com.lovelink.premium.yearly",
    "lovelink.premium.monthly",
];

/// Check whether a product ID is a known subscription product.
#[must_use]
pub fn is_supported_product(product_id: &str) -> bool {
    SUBSCRIPTION_PRODUCT_IDS.contains(&product_id) || LEGACY_PRODUCT_IDS.contains(&product_id)
}

/// Billing cadence of a premium subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumPlan {
    Monthly,
    Yearly,
}

impl PremiumPlan {
    /// Convert to the stored string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// The product sold today for this plan.
    #[must_use]
    pub fn product_id(&self) -> &'static str {
        match self {
            Self::Monthly => MONTHLY_PRODUCT_ID,
            Self::Yearly => YEARLY_PRODUCT_ID,
        }
    }

    /// Map a current or legacy product ID to its plan.
    #[must_use]
    pub fn for_product(product_id: &str) -> Option<Self> {
        if !is_supported_product(product_id) {
            return None;
        }
        if product_id.ends_with(".yearly") {
            Some(Self::Yearly)
        } else if product_id.ends_with(".monthly") {
            Some(Self::Monthly)
        } else {
            None
        }
    }

    /// Length of one billing cycle.
    #[must_use]
    pub fn cycle(&self) -> Months {
        match self {
            Self::Monthly => Months::new(1),
            Self::Yearly => Months::new(12),
        }
    }

    /// End of the validity window that starts at `granted_at`.
    ///
    /// Calendar-aware: a cycle that lands past the end of a shorter month
    /// clamps to that month's last day, so Jan 31 + 1 month is Feb 28 (or
    /// Feb 29 in a leap year) and Feb 29 + 1 year is Feb 28.
    #[must_use]
    pub fn expires_at(&self, granted_at: DateTime<Utc>) -> DateTime<Utc> {
        granted_at
            .checked_add_months(self.cycle())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl FromStr for PremiumPlan {
    type Err = EntitlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(EntitlementError::InvalidPlan {
                plan: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PremiumPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
