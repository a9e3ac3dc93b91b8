//! In-memory entitlement store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::premium::error::StoreError;
use crate::premium::purchase::GRANT_PROCEDURE;
use crate::premium::storage::{
    EntitlementRecord, GrantProcedure, GrantRequest, GrantResponse, MomentsStore,
    PartnershipRecord, PartnershipStore, PremiumGrant, ProfileStore, StoreResult, TrialColumns,
    TrialProfile,
};

/// Failures that can be injected into [`InMemoryEntitlementStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFault {
    /// Trial reads that include the bypass column report it as missing.
    MissingBypassColumn,
    /// The grant procedure is not deployed.
    MissingGrantProcedure,
    /// Entitlement record reads fail.
    EntitlementReads,
    /// Trial profile reads fail, with or without the bypass column.
    TrialReads,
    /// Partnership reads fail.
    PartnershipReads,
    /// Moment counts fail.
    MomentsReads,
    /// Premium writes to this account fail.
    WritesFor(String),
    /// The grant procedure runs and fails.
    GrantProcedureFails,
    /// The grant procedure runs and refuses the grant.
    RejectGrants,
}

/// In-memory store implementing every entitlement store trait.
///
/// Wraps data in Arc for cheap cloning; clones share state.
#[derive(Default, Clone)]
pub struct InMemoryEntitlementStore {
    inner: Arc<InMemoryEntitlementStoreInner>,
}

#[derive(Default)]
struct InMemoryEntitlementStoreInner {
    accounts: RwLock<HashMap<String, EntitlementRecord>>,
    partnerships: RwLock<Vec<PartnershipRecord>>,
    moments: RwLock<HashMap<String, u64>>,
    faults: RwLock<Vec<StoreFault>>,
    premium_writes: RwLock<Vec<(String, PremiumGrant)>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryEntitlementStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account record.
    pub fn insert_account(&self, record: EntitlementRecord) {
        write(&self.inner.accounts).insert(record.account_id.clone(), record);
    }

    /// Insert a partnership.
    pub fn insert_partnership(&self, partnership: PartnershipRecord) {
        write(&self.inner.partnerships).push(partnership);
    }

    /// Set the moment count for a partnership.
    pub fn set_moments(&self, partnership_id: &str, count: u64) {
        write(&self.inner.moments).insert(partnership_id.to_string(), count);
    }

    /// Set the trial bypass flag, as the administrative process would.
    pub fn set_trial_bypass(&self, account_id: &str, bypass: bool) {
        if let Some(record) = write(&self.inner.accounts).get_mut(account_id) {
            record.trial_access_bypass = bypass;
        }
    }

    /// Inject a fault.
    pub fn inject(&self, fault: StoreFault) {
        write(&self.inner.faults).push(fault);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        write(&self.inner.faults).clear();
    }

    /// Get an account record (for testing).
    pub fn get_record(&self, account_id: &str) -> Option<EntitlementRecord> {
        read(&self.inner.accounts).get(account_id).cloned()
    }

    /// Every premium write, in order, from both the client path and the
    /// procedure.
    pub fn premium_writes(&self) -> Vec<(String, PremiumGrant)> {
        read(&self.inner.premium_writes).clone()
    }

    fn has_fault(&self, fault: &StoreFault) -> bool {
        read(&self.inner.faults).contains(fault)
    }

    fn writes_fail_for(&self, account_id: &str) -> bool {
        read(&self.inner.faults)
            .iter()
            .any(|f| matches!(f, StoreFault::WritesFor(id) if id == account_id))
    }

    fn active_partnerships(&self, account_id: &str) -> Vec<PartnershipRecord> {
        read(&self.inner.partnerships)
            .iter()
            .filter(|p| p.is_active() && p.includes(account_id))
            .cloned()
            .collect()
    }

    /// Partner lookup as the grant procedure does it server-side.
    fn procedure_partner(&self, account_id: &str) -> Option<String> {
        let accounts = read(&self.inner.accounts);
        let cached = accounts
            .get(account_id)
            .and_then(|r| r.linked_partner_id.clone())
            .filter(|id| !id.is_empty());

        cached
            .or_else(|| {
                self.active_partnerships(account_id)
                    .into_iter()
                    .max_by_key(|p| p.created_at)
                    .map(|p| p.other_side(account_id).to_string())
            })
            .filter(|id| accounts.contains_key(id))
    }

    fn write_grant(&self, account_id: &str, grant: &PremiumGrant) -> StoreResult<()> {
        if self.writes_fail_for(account_id) {
            return Err(StoreError::from_code("08006", format!("write to {} failed", account_id)));
        }

        let mut accounts = write(&self.inner.accounts);
        let record = accounts.get_mut(account_id).ok_or(StoreError::NotFound)?;
        record.apply_grant(grant);
        write(&self.inner.premium_writes).push((account_id.to_string(), grant.clone()));
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryEntitlementStore {
    async fn get_entitlement(&self, account_id: &str) -> StoreResult<Option<EntitlementRecord>> {
        if self.has_fault(&StoreFault::EntitlementReads) {
            return Err(StoreError::backend("connection reset"));
        }
        Ok(self.get_record(account_id))
    }

    async fn get_trial_profile(
        &self,
        account_id: &str,
        columns: TrialColumns,
    ) -> StoreResult<Option<TrialProfile>> {
        if columns == TrialColumns::WithBypass && self.has_fault(&StoreFault::MissingBypassColumn) {
            return Err(StoreError::from_code(
                "42703",
                "column profiles.trial_access_bypass does not exist",
            ));
        }
        if self.has_fault(&StoreFault::TrialReads) {
            return Err(StoreError::from_code("PGRST999", "db unavailable"));
        }

        Ok(self.get_record(account_id).map(|record| TrialProfile {
            account_created_at: record.account_created_at,
            trial_access_bypass: columns == TrialColumns::WithBypass && record.trial_access_bypass,
        }))
    }

    async fn update_premium(&self, account_id: &str, grant: &PremiumGrant) -> StoreResult<()> {
        self.write_grant(account_id, grant)
    }
}

#[async_trait]
impl PartnershipStore for InMemoryEntitlementStore {
    async fn list_active_partnerships(&self, account_id: &str) -> StoreResult<Vec<PartnershipRecord>> {
        if self.has_fault(&StoreFault::PartnershipReads) {
            return Err(StoreError::backend("partnerships unavailable"));
        }
        Ok(self.active_partnerships(account_id))
    }
}

#[async_trait]
impl MomentsStore for InMemoryEntitlementStore {
    async fn count_moments(&self, partnership_id: &str) -> StoreResult<u64> {
        if self.has_fault(&StoreFault::MomentsReads) {
            return Err(StoreError::backend("moments unavailable"));
        }
        Ok(read(&self.inner.moments).get(partnership_id).copied().unwrap_or(0))
    }
}

#[async_trait]
impl GrantProcedure for InMemoryEntitlementStore {
    async fn grant_premium(&self, request: &GrantRequest) -> StoreResult<GrantResponse> {
        if self.has_fault(&StoreFault::MissingGrantProcedure) {
            return Err(StoreError::from_code(
                "PGRST202",
                format!(
                    "Could not find the function public.{}(p_plan, p_premium_expires, p_premium_since, p_product_id, p_transaction_id, p_user_id) in the schema cache",
                    GRANT_PROCEDURE
                ),
            ));
        }
        if self.has_fault(&StoreFault::GrantProcedureFails) {
            return Err(StoreError::from_code("P0001", "grant failed"));
        }
        if self.has_fault(&StoreFault::RejectGrants) {
            return Ok(GrantResponse::Rejected {
                reason: "transaction already used by another account".to_string(),
            });
        }

        let Some(record) = self.get_record(&request.account_id) else {
            return Ok(GrantResponse::Rejected {
                reason: "profile not found".to_string(),
            });
        };

        let partner_id = self.procedure_partner(&request.account_id);

        if record.last_purchase_transaction_id.as_deref() == Some(request.transaction_id.as_str()) {
            return Ok(GrantResponse::Granted { partner_id });
        }

        // Both writes happen or neither does.
        let partner_blocked = partner_id.as_deref().is_some_and(|id| self.writes_fail_for(id));
        if self.writes_fail_for(&request.account_id) || partner_blocked {
            return Err(StoreError::from_code("40001", "could not serialize access"));
        }

        let grant = request.purchaser_grant();
        self.write_grant(&request.account_id, &grant)?;
        if let Some(partner_id) = &partner_id {
            self.write_grant(partner_id, &grant.for_partner(&request.account_id))?;
        }

        Ok(GrantResponse::Granted { partner_id })
    }
}
