//! The entitlement engine facade.

use chrono::{DateTime, Utc};

use super::audit::{EntitlementAuditLogger, TracingAuditLogger};
use super::client::{PurchaseClient, PurchaseReceipt};
use super::clock::{Clock, SystemClock};
use super::entitlements::{FeatureGate, FeatureLimits, MomentsLimitCheck, PremiumCapability, PulsePattern};
use super::error::EntitlementError;
use super::plans::PremiumPlan;
use super::purchase::{PartnerSync, PurchaseOutcome, PurchaseReconciler};
use super::status::{ExpiryLabel, PremiumStatus, PremiumStatusResolver, format_premium_expiry};
use super::storage::{GrantProcedure, MomentsStore, PartnershipStore, ProfileStore};
use super::trial::{AppFeature, FeatureAccess, TrialAccessResolver, TrialAccessStatus};
use crate::config::PremiumConfig;

/// Every store the engine reads or writes.
///
/// Implemented automatically for any type that implements all four store
/// traits.
pub trait EntitlementBackend:
    ProfileStore + PartnershipStore + MomentsStore + GrantProcedure + Clone
{
}

impl<T> EntitlementBackend for T where
    T: ProfileStore + PartnershipStore + MomentsStore + GrantProcedure + Clone
{
}

/// Resolvers, gate and reconciler over one backend and one clock.
///
/// # Example
///
/// ```rust
/// use lovelink::premium::{EntitlementEngine, FixedClock};
/// use lovelink::testing::{InMemoryEntitlementStore, TestAccount};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = InMemoryEntitlementStore::new();
/// store.insert_account(TestAccount::builder().with_id("user-1").build());
///
/// let engine = EntitlementEngine::new(store, FixedClock::at("2026-01-03T00:00:00Z"));
/// let trial = engine.get_trial_access_status("user-1").await;
/// assert!(trial.is_in_trial);
/// # }
/// ```
pub struct EntitlementEngine<S, C = SystemClock, A = TracingAuditLogger> {
    trial: TrialAccessResolver<S, C>,
    gate: FeatureGate<S, C>,
    reconciler: PurchaseReconciler<S, C, A>,
    clock: C,
}

impl<S: EntitlementBackend> EntitlementEngine<S, SystemClock, TracingAuditLogger> {
    /// Create an engine on the system clock with default policy.
    #[must_use]
    pub fn with_system_clock(store: S) -> Self {
        Self::new(store, SystemClock)
    }
}

impl<S, C> EntitlementEngine<S, C, TracingAuditLogger>
where
    S: EntitlementBackend,
    C: Clock + Clone,
{
    /// Create an engine with default policy.
    #[must_use]
    pub fn new(store: S, clock: C) -> Self {
        Self::with_config(store, clock, &PremiumConfig::default())
    }

    /// Create an engine with the given policy.
    #[must_use]
    pub fn with_config(store: S, clock: C, config: &PremiumConfig) -> Self {
        Self::with_audit_logger(store, clock, config, TracingAuditLogger)
    }
}

impl<S, C, A> EntitlementEngine<S, C, A>
where
    S: EntitlementBackend,
    C: Clock + Clone,
    A: EntitlementAuditLogger,
{
    /// Create an engine with a custom audit logger.
    #[must_use]
    pub fn with_audit_logger(store: S, clock: C, config: &PremiumConfig, audit: A) -> Self {
        Self {
            trial: TrialAccessResolver::new(store.clone(), clock.clone()).with_trial_days(config.trial_days),
            gate: FeatureGate::new(store.clone(), clock.clone())
                .with_free_moments_limit(config.free_moments_limit),
            reconciler: PurchaseReconciler::with_audit_logger(store, clock.clone(), audit),
            clock,
        }
    }

    /// See [`PremiumStatusResolver::get_premium_status`].
    pub async fn get_premium_status(&self, account_id: &str) -> PremiumStatus {
        self.premium().get_premium_status(account_id).await
    }

    /// See [`TrialAccessResolver::get_trial_access_status`].
    pub async fn get_trial_access_status(&self, account_id: &str) -> TrialAccessStatus {
        self.trial.get_trial_access_status(account_id).await
    }

    /// See [`TrialAccessResolver::check_feature`].
    pub async fn check_feature(&self, account_id: &str, feature: AppFeature) -> FeatureAccess {
        self.trial.check_feature(account_id, feature).await
    }

    /// See [`FeatureGate::get_feature_limits`].
    pub async fn get_feature_limits(&self, account_id: &str) -> FeatureLimits {
        self.gate.get_feature_limits(account_id).await
    }

    /// See [`FeatureGate::check_feature_access`].
    pub async fn check_feature_access(&self, account_id: &str, capability: PremiumCapability) -> bool {
        self.gate.check_feature_access(account_id, capability).await
    }

    /// See [`FeatureGate::get_available_pulse_patterns`].
    pub async fn get_available_pulse_patterns(&self, account_id: &str) -> Vec<PulsePattern> {
        self.gate.get_available_pulse_patterns(account_id).await
    }

    /// See [`FeatureGate::check_moments_limit`].
    pub async fn check_moments_limit(
        &self,
        account_id: &str,
        partnership_id: Option<&str>,
    ) -> Result<MomentsLimitCheck, EntitlementError> {
        self.gate.check_moments_limit(account_id, partnership_id).await
    }

    /// See [`PurchaseReconciler::save_purchase`].
    pub async fn save_purchase(
        &self,
        account_id: &str,
        receipt: &PurchaseReceipt,
        plan: PremiumPlan,
    ) -> Result<PurchaseOutcome, EntitlementError> {
        self.reconciler.save_purchase(account_id, receipt, plan).await
    }

    /// See [`PurchaseReconciler::purchase`].
    pub async fn purchase<P: PurchaseClient + ?Sized>(
        &self,
        account_id: &str,
        client: &P,
        plan: PremiumPlan,
    ) -> Result<PurchaseOutcome, EntitlementError> {
        self.reconciler.purchase(account_id, client, plan).await
    }

    /// See [`PurchaseReconciler::restore_purchases`].
    pub async fn restore_purchases<P: PurchaseClient + ?Sized>(
        &self,
        account_id: &str,
        client: &P,
    ) -> Result<Option<PurchaseOutcome>, EntitlementError> {
        self.reconciler.restore_purchases(account_id, client).await
    }

    /// See [`PurchaseReconciler::resync_partner`].
    pub async fn resync_partner(&self, account_id: &str) -> Result<PartnerSync, EntitlementError> {
        self.reconciler.resync_partner(account_id).await
    }

    /// Summarize an expiry date relative to the engine's clock.
    pub fn format_premium_expiry(&self, expires: Option<DateTime<Utc>>) -> ExpiryLabel {
        format_premium_expiry(expires, self.clock.now())
    }

    pub fn premium(&self) -> &PremiumStatusResolver<S, C> {
        self.trial.premium()
    }

    pub fn trial(&self) -> &TrialAccessResolver<S, C> {
        &self.trial
    }

    pub fn gate(&self) -> &FeatureGate<S, C> {
        &self.gate
    }

    pub fn reconciler(&self) -> &PurchaseReconciler<S, C, A> {
        &self.reconciler
    }
}
