//! Partner lookup.

use super::error::StoreError;
use super::storage::{PartnershipRecord, PartnershipStore, ProfileStore};

/// Finds the account linked to a given account.
///
/// The profile's cached `linked_partner_id` is trusted when present. When it
/// is missing, the most recent active partnership decides. Nothing is
/// written back; a stale pointer stays stale.
#[derive(Debug, Clone)]
pub struct PartnerResolver<S> {
    store: S,
}

impl<S: ProfileStore + PartnershipStore> PartnerResolver<S> {
    /// Create a new partner resolver.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Resolve the partner's account ID.
    ///
    /// `Ok(None)` means "no partner". An `Err` means the partner could not be
    /// determined and must not be read as "no partner".
    pub async fn resolve_partner_id(&self, account_id: &str) -> Result<Option<String>, StoreError> {
        if let Some(record) = self.store.get_entitlement(account_id).await? {
            if let Some(partner_id) = record.linked_partner_id.filter(|id| !id.is_empty()) {
                return Ok(Some(partner_id));
            }
        }

        Ok(self
            .latest_active_partnership(account_id)
            .await?
            .map(|p| p.other_side(account_id).to_string()))
    }

    /// The most recently created active partnership for an account.
    pub async fn latest_active_partnership(
        &self,
        account_id: &str,
    ) -> Result<Option<PartnershipRecord>, StoreError> {
        let partnerships = self.store.list_active_partnerships(account_id).await?;

        Ok(partnerships
            .into_iter()
            .filter(|p| p.is_active() && p.includes(account_id))
            .max_by_key(|p| p.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::premium::storage::PartnershipStatus;
    use crate::testing::{InMemoryEntitlementStore, StoreFault, TestAccount};
    use chrono::{DateTime, Utc};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn partnership(id: &str, a: &str, b: &str, created: &str) -> PartnershipRecord {
        PartnershipRecord {
            id: id.to_string(),
            account_a: a.to_string(),
            account_b: b.to_string(),
            status: PartnershipStatus::Active,
            created_at: ts(created),
        }
    }

    #[tokio::test]
    async fn test_cached_pointer_wins() {
        let store = InMemoryEntitlementStore::new();
        store.insert_account(TestAccount::builder().with_id("user-1").with_partner("user-9").build());
        store.insert_partnership(partnership("p-1", "user-1", "user-2", "2026-01-01T00:00:00Z"));

        let resolver = PartnerResolver::new(store);
        let partner = resolver.resolve_partner_id("user-1").await.unwrap();
        assert_eq!(partner.as_deref(), Some("user-9"));
    }

    #[tokio::test]
    async fn test_falls_back_to_most_recent_partnership() {
        let store = InMemoryEntitlementStore::new();
        store.insert_account(TestAccount::builder().with_id("user-1").build());
        store.insert_partnership(partnership("p-old", "user-3", "user-1", "2025-06-01T00:00:00Z"));
        store.insert_partnership(partnership("p-new", "user-1", "user-2", "2026-01-01T00:00:00Z"));

        let resolver = PartnerResolver::new(store);
        let partner = resolver.resolve_partner_id("user-1").await.unwrap();
        assert_eq!(partner.as_deref(), Some("user-2"));
    }

    #[tokio::test]
    async fn test_account_on_b_side() {
        let store = InMemoryEntitlementStore::new();
        store.insert_account(TestAccount::builder().with_id("user-2").build());
        store.insert_partnership(partnership("p-1", "user-1", "user-2", "2026-01-01T00:00:00Z"));

        let resolver = PartnerResolver::new(store);
        let partner = resolver.resolve_partner_id("user-2").await.unwrap();
        assert_eq!(partner.as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_ended_partnership_ignored() {
        let store = InMemoryEntitlementStore::new();
        store.insert_account(TestAccount::builder().with_id("user-1").build());
        let mut ended = partnership("p-1", "user-1", "user-2", "2026-01-01T00:00:00Z");
        ended.status = PartnershipStatus::Ended;
        store.insert_partnership(ended);

        let resolver = PartnerResolver::new(store);
        assert_eq!(resolver.resolve_partner_id("user-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_no_partner() {
        let store = InMemoryEntitlementStore::new();
        let resolver = PartnerResolver::new(store);
        assert_eq!(resolver.resolve_partner_id("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partnership_read_error_propagates() {
        let store = InMemoryEntitlementStore::new();
        store.insert_account(TestAccount::builder().with_id("user-1").build());
        store.inject(StoreFault::PartnershipReads);

        let resolver = PartnerResolver::new(store);
        let result = resolver.resolve_partner_id("user-1").await;
        assert!(matches!(result, Err(StoreError::Backend { .. })));
    }
}
