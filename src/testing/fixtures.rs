//! Test fixtures for entitlement data
//!
//! Builders produce plain [`EntitlementRecord`] and [`PartnershipRecord`]
//! values, ready to insert into an [`InMemoryEntitlementStore`](super::InMemoryEntitlementStore).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::premium::plans::PremiumPlan;
use crate::premium::storage::{EntitlementRecord, PartnershipRecord, PartnershipStatus};

/// Creation time used when a fixture does not set one (2026-01-01T00:00:00Z).
const DEFAULT_CREATED_AT_SECS: i64 = 1_767_225_600;

/// Helper functions for generating fake test data
pub mod fake {
    use super::*;

    /// Generate a fake UUID as a string
    pub fn uuid() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generate a fake account ID
    pub fn account_id() -> String {
        uuid()
    }

    /// Generate a fake display name
    pub fn name() -> String {
        format!("Test User {}", &Uuid::new_v4().simple().to_string()[..8])
    }

    /// Generate a fake store transaction ID
    pub fn transaction_id() -> String {
        format!("txn-{}", Uuid::new_v4().simple())
    }
}

/// Builder entry point for test account records
pub struct TestAccount;

impl TestAccount {
    /// Create a new TestAccount builder
    pub fn builder() -> TestAccountBuilder {
        TestAccountBuilder::default()
    }

    /// Create a non-premium account with generated values
    pub fn generate() -> EntitlementRecord {
        Self::builder().build()
    }
}

/// Builder for test account records
#[derive(Default)]
pub struct TestAccountBuilder {
    id: Option<String>,
    name: Option<String>,
    created_at: Option<DateTime<Utc>>,
    premium: Option<(PremiumPlan, Option<DateTime<Utc>>, Option<DateTime<Utc>>)>,
    bypass: bool,
    partner_id: Option<String>,
}

impl TestAccountBuilder {
    /// Set the account ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the account creation time
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Give the account its own premium grant
    pub fn premium(
        mut self,
        plan: PremiumPlan,
        granted_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.premium = Some((plan, Some(granted_at), expires_at));
        self
    }

    /// Give the account a premium grant that never expires
    pub fn premium_forever(mut self, plan: PremiumPlan) -> Self {
        self.premium = Some((plan, None, None));
        self
    }

    /// Set the administrative trial bypass
    pub fn bypass(mut self) -> Self {
        self.bypass = true;
        self
    }

    /// Set the cached partner pointer
    pub fn with_partner(mut self, partner_id: impl Into<String>) -> Self {
        self.partner_id = Some(partner_id.into());
        self
    }

    /// Build the record
    pub fn build(self) -> EntitlementRecord {
        let created_at = self
            .created_at
            .unwrap_or_else(|| DateTime::from_timestamp(DEFAULT_CREATED_AT_SECS, 0).unwrap_or_default());

        let mut record = EntitlementRecord::new(self.id.unwrap_or_else(fake::account_id), created_at);
        record.display_name = Some(self.name.unwrap_or_else(fake::name));
        record.trial_access_bypass = self.bypass;
        record.linked_partner_id = self.partner_id;

        if let Some((plan, granted_at, expires_at)) = self.premium {
            record.is_premium = true;
            record.premium_plan = Some(plan);
            record.premium_granted_at = Some(granted_at.unwrap_or(created_at));
            record.premium_expires_at = expires_at;
        }

        record
    }
}

/// Builders for partnership records
pub struct TestPartnership;

impl TestPartnership {
    /// An active partnership between two accounts
    pub fn active(
        id: impl Into<String>,
        account_a: impl Into<String>,
        account_b: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> PartnershipRecord {
        PartnershipRecord {
            id: id.into(),
            account_a: account_a.into(),
            account_b: account_b.into(),
            status: PartnershipStatus::Active,
            created_at,
        }
    }

    /// An ended partnership between two accounts
    pub fn ended(
        id: impl Into<String>,
        account_a: impl Into<String>,
        account_b: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> PartnershipRecord {
        PartnershipRecord {
            status: PartnershipStatus::Ended,
            ..Self::active(id, account_a, account_b, created_at)
        }
    }
}
