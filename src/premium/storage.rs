//! Storage traits for entitlement data.
//!
//! The engine does not own its data. Profiles, partnerships, moments and the
//! atomic grant procedure all live in the hosted backend; implement these
//! traits to connect the engine to it. An in-memory implementation is
//! provided in [`crate::testing`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StoreError;
use super::plans::PremiumPlan;

/// Result type for store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Per-account entitlement record, as stored on the profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    /// Account ID.
    pub account_id: String,
    /// Profile display name.
    pub display_name: Option<String>,
    /// This account's own paid flag.
    pub is_premium: bool,
    /// Plan of the current grant.
    pub premium_plan: Option<PremiumPlan>,
    /// When the current grant started.
    pub premium_granted_at: Option<DateTime<Utc>>,
    /// When the current grant ends. `None` never expires.
    pub premium_expires_at: Option<DateTime<Utc>>,
    /// Account that bought the grant when it was copied from a partner.
    pub premium_granted_by: Option<String>,
    /// Transaction ID of the last reconciled purchase.
    pub last_purchase_transaction_id: Option<String>,
    /// Product ID of the last reconciled purchase.
    pub last_purchase_product_id: Option<String>,
    /// Account creation time, anchors the trial window.
    pub account_created_at: Option<DateTime<Utc>>,
    /// Administrative trial override.
    pub trial_access_bypass: bool,
    /// Cached pointer to the linked partner. May be stale.
    pub linked_partner_id: Option<String>,
}

impl EntitlementRecord {
    /// Create the record written when an account is created.
    #[must_use]
    pub fn new(account_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            account_id: account_id.into(),
            display_name: None,
            is_premium: false,
            premium_plan: None,
            premium_granted_at: None,
            premium_expires_at: None,
            premium_granted_by: None,
            last_purchase_transaction_id: None,
            last_purchase_product_id: None,
            account_created_at: Some(created_at),
            trial_access_bypass: false,
            linked_partner_id: None,
        }
    }

    /// Check whether this account's own grant is valid at `now`.
    ///
    /// An expiry equal to `now` is already expired.
    #[must_use]
    pub fn is_premium_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.premium_expires_at.is_none_or(|expires| expires > now)
    }

    /// Apply a grant to this record.
    pub fn apply_grant(&mut self, grant: &PremiumGrant) {
        self.is_premium = true;
        self.premium_plan = Some(grant.plan);
        self.premium_granted_at = Some(grant.granted_at);
        self.premium_expires_at = grant.expires_at;
        self.premium_granted_by = grant.granted_by.clone();
        if let Some(transaction_id) = &grant.transaction_id {
            self.last_purchase_transaction_id = Some(transaction_id.clone());
        }
        if let Some(product_id) = &grant.product_id {
            self.last_purchase_product_id = Some(product_id.clone());
        }
    }
}

/// Columns read by the trial check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialColumns {
    /// `created_at` and `trial_access_bypass`.
    WithBypass,
    /// `created_at` only, for schemas without the bypass column.
    CreatedAtOnly,
}

/// Partial profile read used by the trial check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrialProfile {
    /// Account creation time.
    pub account_created_at: Option<DateTime<Utc>>,
    /// Bypass flag. Always `false` for [`TrialColumns::CreatedAtOnly`] reads.
    pub trial_access_bypass: bool,
}

/// Premium fields written by a purchase or a partner sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremiumGrant {
    /// Plan being granted.
    pub plan: PremiumPlan,
    /// Start of the validity window.
    pub granted_at: DateTime<Utc>,
    /// End of the validity window. `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Purchase transaction, set on the purchaser's record only.
    pub transaction_id: Option<String>,
    /// Purchased product, set on the purchaser's record only.
    pub product_id: Option<String>,
    /// Purchaser, set on the partner's record only.
    pub granted_by: Option<String>,
}

impl PremiumGrant {
    /// The same window, shaped for the partner of `purchaser_id`.
    #[must_use]
    pub fn for_partner(&self, purchaser_id: &str) -> Self {
        Self {
            plan: self.plan,
            granted_at: self.granted_at,
            expires_at: self.expires_at,
            transaction_id: None,
            product_id: None,
            granted_by: Some(purchaser_id.to_string()),
        }
    }
}

/// Partnership status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnershipStatus {
    Active,
    Ended,
}

/// A pairing between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnershipRecord {
    /// Partnership ID.
    pub id: String,
    /// One side of the pair.
    pub account_a: String,
    /// The other side of the pair.
    pub account_b: String,
    /// Current status.
    pub status: PartnershipStatus,
    /// When the pair was linked.
    pub created_at: DateTime<Utc>,
}

impl PartnershipRecord {
    /// The side of this partnership that is not `account_id`.
    #[must_use]
    pub fn other_side(&self, account_id: &str) -> &str {
        if self.account_a == account_id {
            &self.account_b
        } else {
            &self.account_a
        }
    }

    /// Check if `account_id` is either side.
    #[must_use]
    pub fn includes(&self, account_id: &str) -> bool {
        self.account_a == account_id || self.account_b == account_id
    }

    /// Check if the partnership is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PartnershipStatus::Active
    }
}

/// Arguments for the atomic grant procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    pub account_id: String,
    pub product_id: String,
    pub transaction_id: String,
    pub plan: PremiumPlan,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl GrantRequest {
    /// The grant to write on the purchaser's own record.
    #[must_use]
    pub fn purchaser_grant(&self) -> PremiumGrant {
        PremiumGrant {
            plan: self.plan,
            granted_at: self.granted_at,
            expires_at: Some(self.expires_at),
            transaction_id: Some(self.transaction_id.clone()),
            product_id: Some(self.product_id.clone()),
            granted_by: None,
        }
    }
}

/// What the atomic grant procedure reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantResponse {
    /// The purchaser was granted; `partner_id` was synced in the same
    /// transaction when present.
    Granted { partner_id: Option<String> },
    /// The procedure ran and refused the grant.
    Rejected { reason: String },
}

/// Account profile storage.
///
/// Reads must report a missing row as `Ok(None)`. Column-level schema
/// drift must surface as [`StoreError::MissingColumn`].
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Get the entitlement record for an account.
    async fn get_entitlement(&self, account_id: &str) -> StoreResult<Option<EntitlementRecord>>;

    /// Read only the trial columns for an account.
    async fn get_trial_profile(
        &self,
        account_id: &str,
        columns: TrialColumns,
    ) -> StoreResult<Option<TrialProfile>>;

    /// Write premium fields on an account's record.
    ///
    /// Returns [`StoreError::NotFound`] if the account has no record.
    async fn update_premium(&self, account_id: &str, grant: &PremiumGrant) -> StoreResult<()>;
}

/// Partnership storage (read-only).
#[async_trait]
pub trait PartnershipStore: Send + Sync {
    /// List active partnerships where `account_id` is either side.
    ///
    /// Order is not guaranteed; callers sort by `created_at`.
    async fn list_active_partnerships(
        &self,
        account_id: &str,
    ) -> StoreResult<Vec<PartnershipRecord>>;
}

/// Moment storage (count only).
#[async_trait]
pub trait MomentsStore: Send + Sync {
    /// Count moments shared within a partnership.
    async fn count_moments(&self, partnership_id: &str) -> StoreResult<u64>;
}

/// The server-side atomic grant procedure.
#[async_trait]
pub trait GrantProcedure: Send + Sync {
    /// Grant premium to the purchaser and sync the linked partner in one
    /// transaction.
    ///
    /// Returns [`StoreError::MissingProcedure`] when the procedure is not
    /// deployed.
    async fn grant_premium(&self, request: &GrantRequest) -> StoreResult<GrantResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_premium_validity_boundary() {
        let now = ts("2026-02-28T12:00:00Z");
        let mut record = EntitlementRecord::new("user-1", now - Duration::days(30));
        record.is_premium = true;

        record.premium_expires_at = Some(now);
        assert!(!record.is_premium_valid_at(now));

        record.premium_expires_at = Some(now - Duration::milliseconds(1));
        assert!(!record.is_premium_valid_at(now));

        record.premium_expires_at = Some(now + Duration::milliseconds(1));
        assert!(record.is_premium_valid_at(now));

        record.premium_expires_at = None;
        assert!(record.is_premium_valid_at(now));
    }

    #[test]
    fn test_flag_required_for_validity() {
        let now = ts("2026-02-28T12:00:00Z");
        let mut record = EntitlementRecord::new("user-1", now);
        record.premium_expires_at = Some(now + Duration::days(10));
        assert!(!record.is_premium_valid_at(now));
    }

    #[test]
    fn test_apply_grant_for_partner_keeps_purchase_fields() {
        let now = ts("2026-01-15T00:00:00Z");
        let mut record = EntitlementRecord::new("user-2", now);
        record.last_purchase_transaction_id = Some("txn-old".to_string());

        let grant = PremiumGrant {
            plan: PremiumPlan::Yearly,
            granted_at: now,
            expires_at: Some(ts("2027-01-15T00:00:00Z")),
            transaction_id: Some("txn-1".to_string()),
            product_id: Some("com.lovelinkcouples.premium.yearly".to_string()),
            granted_by: None,
        };
        record.apply_grant(&grant.for_partner("user-1"));

        assert!(record.is_premium);
        assert_eq!(record.premium_plan, Some(PremiumPlan::Yearly));
        assert_eq!(record.premium_granted_by.as_deref(), Some("user-1"));
        assert_eq!(record.last_purchase_transaction_id.as_deref(), Some("txn-old"));
    }

    #[test]
    fn test_partnership_other_side() {
        let partnership = PartnershipRecord {
            id: "p-1".to_string(),
            account_a: "user-1".to_string(),
            account_b: "user-2".to_string(),
            status: PartnershipStatus::Active,
            created_at: ts("2026-01-01T00:00:00Z"),
        };
        assert_eq!(partnership.other_side("user-1"), "user-2");
        assert_eq!(partnership.other_side("user-2"), "user-1");
        assert!(partnership.includes("user-2"));
        assert!(!partnership.includes("user-3"));
    }
}
