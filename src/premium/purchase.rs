//! Purchase reconciliation.
//!
//! Turns a store receipt into durable entitlement state in two phases:
//!
//! 1. **Primary**: grant premium to the purchaser. Must succeed, or the whole
//!    call fails.
//! 2. **Secondary**: copy the grant to the linked partner. Best-effort; its
//!    outcome is reported in [`PurchaseOutcome::partner_sync`] and the audit
//!    trail, never as an error. A failed secondary phase can be re-driven with
//!    [`PurchaseReconciler::resync_partner`].
//!
//! The atomic grant procedure runs both phases in one transaction. When it is
//! not deployed, the reconciler runs them itself.

use chrono::{DateTime, Utc};

use super::audit::{EntitlementAuditEvent, EntitlementAuditLogger, TracingAuditLogger};
use super::client::{PurchaseClient, PurchaseReceipt, ensure_connected};
use super::clock::Clock;
use super::error::{EntitlementError, StoreError};
use super::partner::PartnerResolver;
use super::plans::PremiumPlan;
use super::storage::{
    EntitlementRecord, GrantProcedure, GrantRequest, GrantResponse, PartnershipStore,
    PremiumGrant, ProfileStore,
};
use super::validation::{validate_account_id, validate_receipt};

/// Name of the server-side grant procedure.
pub const GRANT_PROCEDURE: &str = "grant_premium_from_iap";

/// Whether the primary phase wrote anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantStatus {
    /// The grant was written by this call.
    Applied,
    /// The transaction had already been reconciled; nothing was written.
    AlreadyApplied,
}

/// Which path performed the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePath {
    /// The atomic grant procedure.
    Procedure,
    /// Sequential client-side writes, used when the procedure is missing.
    ClientFallback,
}

/// Outcome of the secondary phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartnerSync {
    /// Skipped because the primary phase wrote nothing.
    NotAttempted,
    /// The purchaser has no partner.
    NoPartner,
    /// The partner's record now carries the grant.
    Synced { partner_id: String },
    /// The partner could not be resolved or written.
    Failed {
        partner_id: Option<String>,
        error: String,
    },
}

impl PartnerSync {
    /// Check if the secondary phase should be re-driven.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct PurchaseOutcome {
    pub account_id: String,
    pub transaction_id: String,
    pub status: GrantStatus,
    /// `None` when nothing was written.
    pub write_path: Option<WritePath>,
    pub plan: Option<PremiumPlan>,
    pub granted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub partner_sync: PartnerSync,
}

impl PurchaseOutcome {
    fn replayed(record: &EntitlementRecord, transaction_id: &str) -> Self {
        Self {
            account_id: record.account_id.clone(),
            transaction_id: transaction_id.to_string(),
            status: GrantStatus::AlreadyApplied,
            write_path: None,
            plan: record.premium_plan,
            granted_at: record.premium_granted_at,
            expires_at: record.premium_expires_at,
            partner_sync: PartnerSync::NotAttempted,
        }
    }

    fn applied(request: &GrantRequest, write_path: WritePath, partner_sync: PartnerSync) -> Self {
        Self {
            account_id: request.account_id.clone(),
            transaction_id: request.transaction_id.clone(),
            status: GrantStatus::Applied,
            write_path: Some(write_path),
            plan: Some(request.plan),
            granted_at: Some(request.granted_at),
            expires_at: Some(request.expires_at),
            partner_sync,
        }
    }
}

/// Reconciles purchase receipts into entitlement records.
pub struct PurchaseReconciler<S, C, A = TracingAuditLogger> {
    store: S,
    partners: PartnerResolver<S>,
    clock: C,
    audit: A,
}

impl<S, C> PurchaseReconciler<S, C, TracingAuditLogger>
where
    S: ProfileStore + PartnershipStore + GrantProcedure + Clone,
    C: Clock,
{
    /// Create a reconciler that audits through `tracing`.
    #[must_use]
    pub fn new(store: S, clock: C) -> Self {
        Self::with_audit_logger(store, clock, TracingAuditLogger)
    }
}

impl<S, C, A> PurchaseReconciler<S, C, A>
where
    S: ProfileStore + PartnershipStore + GrantProcedure + Clone,
    C: Clock,
    A: EntitlementAuditLogger,
{
    /// Create a reconciler with a custom audit logger.
    #[must_use]
    pub fn with_audit_logger(store: S, clock: C, audit: A) -> Self {
        Self {
            partners: PartnerResolver::new(store.clone()),
            store,
            clock,
            audit,
        }
    }

    /// Reconcile a purchase receipt for an account.
    ///
    /// Validation runs before any store call. A receipt whose transaction ID
    /// is already recorded on the purchaser is acknowledged without writing.
    pub async fn save_purchase(
        &self,
        account_id: &str,
        receipt: &PurchaseReceipt,
        plan: PremiumPlan,
    ) -> Result<PurchaseOutcome, EntitlementError> {
        validate_account_id(account_id)?;
        validate_receipt(receipt)?;
        let transaction_id = receipt.transaction_id.trim();

        let record = self
            .store
            .get_entitlement(account_id)
            .await?
            .ok_or_else(|| EntitlementError::AccountNotFound {
                account_id: account_id.to_string(),
            })?;

        if record.last_purchase_transaction_id.as_deref() == Some(transaction_id) {
            tracing::info!(
                target: "lovelink::premium",
                account_id = %account_id,
                transaction_id = %transaction_id,
                "Purchase already applied, skipping"
            );
            self.audit
                .log(EntitlementAuditEvent::PurchaseReplayed {
                    account_id: account_id.to_string(),
                    transaction_id: transaction_id.to_string(),
                })
                .await;
            return Ok(PurchaseOutcome::replayed(&record, transaction_id));
        }

        let granted_at = self.clock.now();
        let request = GrantRequest {
            account_id: account_id.to_string(),
            product_id: receipt.product_id.clone(),
            transaction_id: transaction_id.to_string(),
            plan,
            granted_at,
            expires_at: plan.expires_at(granted_at),
        };

        match self.store.grant_premium(&request).await {
            Ok(GrantResponse::Granted { partner_id }) => {
                self.log_granted(&request, true).await;
                let partner_sync = match partner_id {
                    Some(partner_id) => {
                        self.audit
                            .log(EntitlementAuditEvent::PartnerSynced {
                                account_id: account_id.to_string(),
                                partner_id: partner_id.clone(),
                            })
                            .await;
                        PartnerSync::Synced { partner_id }
                    }
                    None => PartnerSync::NoPartner,
                };
                Ok(PurchaseOutcome::applied(&request, WritePath::Procedure, partner_sync))
            }
            Ok(GrantResponse::Rejected { reason }) => {
                tracing::warn!(
                    target: "lovelink::premium",
                    account_id = %account_id,
                    transaction_id = %transaction_id,
                    reason = %reason,
                    "Grant procedure rejected purchase"
                );
                Err(EntitlementError::GrantRejected { reason })
            }
            Err(StoreError::MissingProcedure { name }) => {
                let procedure = if name.is_empty() { GRANT_PROCEDURE } else { name.as_str() };
                tracing::warn!(
                    target: "lovelink::premium",
                    account_id = %account_id,
                    procedure = %procedure,
                    "Grant procedure missing, falling back to client-side writes"
                );
                self.audit
                    .log(EntitlementAuditEvent::GrantProcedureUnavailable {
                        account_id: account_id.to_string(),
                    })
                    .await;
                self.grant_client_side(&request).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run the purchase flow end to end.
    ///
    /// Connects the client if needed, requests the current product for
    /// `plan`, and reconciles the returned receipt.
    pub async fn purchase<P: PurchaseClient + ?Sized>(
        &self,
        account_id: &str,
        client: &P,
        plan: PremiumPlan,
    ) -> Result<PurchaseOutcome, EntitlementError> {
        validate_account_id(account_id)?;
        ensure_connected(client).await?;

        let receipt = client
            .request_subscription(plan.product_id())
            .await?
            .ok_or_else(|| EntitlementError::PurchaseFailed {
                message: "no purchase data received".to_string(),
            })?;

        self.save_purchase(account_id, &receipt, plan).await
    }

    /// Reconcile the first subscription the store still reports.
    ///
    /// Returns `Ok(None)` when the store has no subscription purchase. The
    /// plan is derived from the product, so legacy products restore too.
    pub async fn restore_purchases<P: PurchaseClient + ?Sized>(
        &self,
        account_id: &str,
        client: &P,
    ) -> Result<Option<PurchaseOutcome>, EntitlementError> {
        validate_account_id(account_id)?;
        ensure_connected(client).await?;

        let purchases = client.available_purchases().await?;
        let Some((receipt, plan)) = purchases
            .into_iter()
            .find_map(|p| PremiumPlan::for_product(&p.product_id).map(|plan| (p, plan)))
        else {
            tracing::debug!(
                target: "lovelink::premium",
                account_id = %account_id,
                "No subscription purchases to restore"
            );
            return Ok(None);
        };

        self.save_purchase(account_id, &receipt, plan).await.map(Some)
    }

    /// Re-run only the secondary phase from the purchaser's stored grant.
    ///
    /// Fails with [`EntitlementError::NothingToSync`] if the account has no
    /// currently valid grant of its own to share.
    pub async fn resync_partner(&self, account_id: &str) -> Result<PartnerSync, EntitlementError> {
        validate_account_id(account_id)?;

        let record = self
            .store
            .get_entitlement(account_id)
            .await?
            .ok_or_else(|| EntitlementError::AccountNotFound {
                account_id: account_id.to_string(),
            })?;

        let grant = Self::shareable_grant(&record, self.clock.now()).ok_or_else(|| {
            EntitlementError::NothingToSync {
                account_id: account_id.to_string(),
            }
        })?;

        Ok(self.sync_partner(account_id, &grant).await)
    }

    async fn grant_client_side(&self, request: &GrantRequest) -> Result<PurchaseOutcome, EntitlementError> {
        let grant = request.purchaser_grant();
        self.store.update_premium(&request.account_id, &grant).await?;
        self.log_granted(request, false).await;

        let partner_sync = self.sync_partner(&request.account_id, &grant).await;
        Ok(PurchaseOutcome::applied(request, WritePath::ClientFallback, partner_sync))
    }

    async fn sync_partner(&self, purchaser_id: &str, grant: &PremiumGrant) -> PartnerSync {
        let partner_id = match self.partners.resolve_partner_id(purchaser_id).await {
            Ok(Some(partner_id)) => partner_id,
            Ok(None) => return PartnerSync::NoPartner,
            Err(e) => return self.sync_failed(purchaser_id, None, e).await,
        };

        match self
            .store
            .update_premium(&partner_id, &grant.for_partner(purchaser_id))
            .await
        {
            Ok(()) => {
                self.audit
                    .log(EntitlementAuditEvent::PartnerSynced {
                        account_id: purchaser_id.to_string(),
                        partner_id: partner_id.clone(),
                    })
                    .await;
                PartnerSync::Synced { partner_id }
            }
            Err(e) => self.sync_failed(purchaser_id, Some(partner_id), e).await,
        }
    }

    async fn sync_failed(
        &self,
        purchaser_id: &str,
        partner_id: Option<String>,
        error: StoreError,
    ) -> PartnerSync {
        tracing::warn!(
            target: "lovelink::premium",
            account_id = %purchaser_id,
            partner_id = ?partner_id,
            error = %error,
            "Partner sync failed, purchaser grant kept"
        );
        self.audit
            .log(EntitlementAuditEvent::PartnerSyncFailed {
                account_id: purchaser_id.to_string(),
                partner_id: partner_id.clone(),
                error: error.to_string(),
            })
            .await;
        PartnerSync::Failed {
            partner_id,
            error: error.to_string(),
        }
    }

    async fn log_granted(&self, request: &GrantRequest, via_procedure: bool) {
        tracing::info!(
            target: "lovelink::premium",
            account_id = %request.account_id,
            transaction_id = %request.transaction_id,
            plan = %request.plan,
            expires_at = %request.expires_at,
            via_procedure,
            "Premium granted"
        );
        self.audit
            .log(EntitlementAuditEvent::PurchaseGranted {
                account_id: request.account_id.clone(),
                transaction_id: request.transaction_id.clone(),
                plan: request.plan.to_string(),
                via_procedure,
            })
            .await;
    }

    /// The purchaser's own grant, if it is valid and was not itself copied
    /// from a partner.
    fn shareable_grant(record: &EntitlementRecord, now: DateTime<Utc>) -> Option<PremiumGrant> {
        if !record.is_premium_valid_at(now) || record.premium_granted_by.is_some() {
            return None;
        }

        Some(PremiumGrant {
            plan: record.premium_plan?,
            granted_at: record.premium_granted_at?,
            expires_at: record.premium_expires_at,
            transaction_id: None,
            product_id: None,
            granted_by: None,
        })
    }
}
