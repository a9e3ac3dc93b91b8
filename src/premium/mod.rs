//! Entitlement resolution for LoveLink couples.
//!
//! Decides who may use gated features, shares one subscription between two
//! linked partners, applies the free trial, and reconciles store purchases
//! into durable entitlement state.
//!
//! # Example
//!
//! ```rust,ignore
//! use lovelink::premium::{EntitlementEngine, PremiumPlan, PurchaseReceipt, SystemClock};
//!
//! let engine = EntitlementEngine::new(store, SystemClock);
//!
//! // Gate a screen
//! if !engine.check_feature(&user.id, AppFeature::Moments).await.is_allowed() {
//!     return show_paywall();
//! }
//!
//! // Reconcile a purchase reported by the store
//! let receipt = PurchaseReceipt::new(PremiumPlan::Yearly.product_id(), txn_id);
//! let outcome = engine.save_purchase(&user.id, &receipt, PremiumPlan::Yearly).await?;
//! if outcome.partner_sync.is_failed() {
//!     // Queue engine.resync_partner(&user.id)
//! }
//! ```

pub mod audit;
pub mod client;
pub mod clock;
pub mod engine;
pub mod entitlements;
pub mod error;
pub mod partner;
pub mod plans;
pub mod purchase;
pub mod status;
pub mod storage;
pub mod trial;
pub mod validation;

// Engine exports
pub use engine::{EntitlementBackend, EntitlementEngine};

// Resolver exports
pub use partner::PartnerResolver;
pub use status::{
    ExpiryLabel, PremiumSource, PremiumStatus, PremiumStatusResolver, ReadFailurePolicy,
    format_premium_expiry,
};
pub use trial::{
    AppFeature, FeatureAccess, GATED_FEATURES, TRIAL_DAYS, TrialAccessResolver, TrialAccessStatus,
    TrialReason, is_missing_bypass_column,
};

// Feature gate exports
pub use entitlements::{
    FREE_MOMENTS_LIMIT, FeatureGate, FeatureLimits, MomentsLimit, MomentsLimitCheck,
    PREMIUM_FEATURES, PremiumCapability, PremiumFeature, PulsePattern,
};

// Purchase exports
pub use client::{
    ActiveSubscription, PurchaseClient, PurchaseClientError, PurchaseReceipt,
    check_active_subscription,
};
pub use plans::{
    LEGACY_PRODUCT_IDS, MONTHLY_PRODUCT_ID, PremiumPlan, SUBSCRIPTION_PRODUCT_IDS,
    YEARLY_PRODUCT_ID, is_supported_product,
};
pub use purchase::{
    GRANT_PROCEDURE, GrantStatus, PartnerSync, PurchaseOutcome, PurchaseReconciler, WritePath,
};

// Storage exports
pub use storage::{
    EntitlementRecord, GrantProcedure, GrantRequest, GrantResponse, MomentsStore,
    PartnershipRecord, PartnershipStatus, PartnershipStore, PremiumGrant, ProfileStore,
    StoreResult, TrialColumns, TrialProfile,
};

// Supporting exports
pub use audit::{EntitlementAuditEvent, EntitlementAuditLogger, NoOpAuditLogger, TracingAuditLogger};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{EntitlementError, StoreError};
pub use validation::{validate_account_id, validate_receipt};
