//! Purchase reconciliation: idempotence, both write paths, partner sync.

use chrono::{DateTime, Utc};
use lovelink::premium::{
    EntitlementAuditEvent, EntitlementError, FixedClock, GrantStatus, MONTHLY_PRODUCT_ID,
    PartnerSync, PremiumPlan, PremiumSource, PremiumStatusResolver, PurchaseClientError,
    PurchaseReceipt, PurchaseReconciler, StoreError, WritePath, YEARLY_PRODUCT_ID,
};
use lovelink::testing::{
    InMemoryEntitlementStore, MockPurchaseClient, RecordingAuditLogger, StoreFault, TestAccount,
    TestPartnership,
};

const NOW: &str = "2026-01-31T10:00:00Z";

fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn couple() -> InMemoryEntitlementStore {
    let store = InMemoryEntitlementStore::new();
    store.insert_account(TestAccount::builder().with_id("buyer").with_name("Jamie").build());
    store.insert_account(TestAccount::builder().with_id("partner").with_name("Riley").build());
    store.insert_partnership(TestPartnership::active("p-1", "buyer", "partner", ts("2026-01-01T00:00:00Z")));
    store
}

fn reconciler(
    store: &InMemoryEntitlementStore,
) -> (PurchaseReconciler<InMemoryEntitlementStore, FixedClock, RecordingAuditLogger>, RecordingAuditLogger) {
    let audit = RecordingAuditLogger::new();
    let reconciler = PurchaseReconciler::with_audit_logger(store.clone(), FixedClock::at(NOW), audit.clone());
    (reconciler, audit)
}

fn monthly(txn: &str) -> PurchaseReceipt {
    PurchaseReceipt::new(MONTHLY_PRODUCT_ID, txn)
}

#[tokio::test]
async fn test_monthly_expiry_clamps_to_month_end() {
    let store = couple();
    let (reconciler, _) = reconciler(&store);

    let outcome = reconciler.save_purchase("buyer", &monthly("txn-1"), PremiumPlan::Monthly).await.unwrap();
    assert_eq!(outcome.granted_at, Some(ts(NOW)));
    assert_eq!(outcome.expires_at, Some(ts("2026-02-28T10:00:00Z")));
}

#[test]
fn test_yearly_expiry_from_leap_day() {
    assert_eq!(
        PremiumPlan::Yearly.expires_at(ts("2026-01-15T00:00:00Z")),
        ts("2027-01-15T00:00:00Z")
    );
    assert_eq!(
        PremiumPlan::Yearly.expires_at(ts("2024-02-29T08:00:00Z")),
        ts("2025-02-28T08:00:00Z")
    );
    assert_eq!(
        PremiumPlan::Monthly.expires_at(ts("2024-01-31T00:00:00Z")),
        ts("2024-02-29T00:00:00Z")
    );
}

#[tokio::test]
async fn test_procedure_grants_both_partners() {
    let store = couple();
    let (reconciler, audit) = reconciler(&store);

    let outcome = reconciler
        .save_purchase("buyer", &PurchaseReceipt::new(YEARLY_PRODUCT_ID, "txn-1"), PremiumPlan::Yearly)
        .await
        .unwrap();

    assert_eq!(outcome.status, GrantStatus::Applied);
    assert_eq!(outcome.write_path, Some(WritePath::Procedure));
    assert_eq!(outcome.partner_sync, PartnerSync::Synced { partner_id: "partner".to_string() });

    let buyer = store.get_record("buyer").unwrap();
    assert_eq!(buyer.last_purchase_transaction_id.as_deref(), Some("txn-1"));
    assert_eq!(buyer.premium_granted_by, None);

    let partner = store.get_record("partner").unwrap();
    assert!(partner.is_premium);
    assert_eq!(partner.premium_expires_at, buyer.premium_expires_at);
    assert_eq!(partner.premium_granted_by.as_deref(), Some("buyer"));
    assert_eq!(partner.last_purchase_transaction_id, None);

    let events = audit.events().await;
    assert!(events.iter().any(|e| matches!(e, EntitlementAuditEvent::PurchaseGranted { via_procedure: true, .. })));
    assert!(events.iter().any(|e| matches!(e, EntitlementAuditEvent::PartnerSynced { .. })));
}

#[tokio::test]
async fn test_replayed_transaction_writes_nothing() {
    let store = couple();
    let (reconciler, audit) = reconciler(&store);

    reconciler.save_purchase("buyer", &monthly("txn-1"), PremiumPlan::Monthly).await.unwrap();
    let writes = store.premium_writes().len();

    let replay = reconciler.save_purchase("buyer", &monthly("txn-1"), PremiumPlan::Monthly).await.unwrap();
    assert_eq!(replay.status, GrantStatus::AlreadyApplied);
    assert_eq!(replay.write_path, None);
    assert_eq!(replay.partner_sync, PartnerSync::NotAttempted);
    assert_eq!(replay.expires_at, Some(ts("2026-02-28T10:00:00Z")));
    assert_eq!(store.premium_writes().len(), writes);

    let events = audit.events().await;
    assert!(matches!(events.last(), Some(EntitlementAuditEvent::PurchaseReplayed { .. })));
}

#[tokio::test]
async fn test_replay_is_idempotent_on_fallback_path() {
    let store = couple();
    store.inject(StoreFault::MissingGrantProcedure);
    let (reconciler, _) = reconciler(&store);

    reconciler.save_purchase("buyer", &monthly("txn-1"), PremiumPlan::Monthly).await.unwrap();
    let writes = store.premium_writes();
    assert_eq!(writes.len(), 2);

    let replay = reconciler.save_purchase("buyer", &monthly(" txn-1 "), PremiumPlan::Monthly).await.unwrap();
    assert_eq!(replay.status, GrantStatus::AlreadyApplied);
    assert_eq!(store.premium_writes(), writes);
}

#[tokio::test]
async fn test_fallback_when_procedure_missing() {
    let store = couple();
    store.inject(StoreFault::MissingGrantProcedure);
    let (reconciler, audit) = reconciler(&store);

    let outcome = reconciler.save_purchase("buyer", &monthly("txn-1"), PremiumPlan::Monthly).await.unwrap();
    assert_eq!(outcome.write_path, Some(WritePath::ClientFallback));
    assert_eq!(outcome.partner_sync, PartnerSync::Synced { partner_id: "partner".to_string() });

    let writes = store.premium_writes();
    assert_eq!(writes[0].0, "buyer");
    assert_eq!(writes[1].0, "partner");
    assert_eq!(writes[1].1.granted_by.as_deref(), Some("buyer"));

    let events = audit.events().await;
    assert!(events.iter().any(|e| matches!(e, EntitlementAuditEvent::GrantProcedureUnavailable { .. })));
    assert!(events.iter().any(|e| matches!(e, EntitlementAuditEvent::PurchaseGranted { via_procedure: false, .. })));
}

#[tokio::test]
async fn test_partner_write_failure_keeps_purchaser_grant() {
    let store = couple();
    store.inject(StoreFault::MissingGrantProcedure);
    store.inject(StoreFault::WritesFor("partner".to_string()));
    let (reconciler, audit) = reconciler(&store);

    let outcome = reconciler.save_purchase("buyer", &monthly("txn-1"), PremiumPlan::Monthly).await.unwrap();
    assert_eq!(outcome.status, GrantStatus::Applied);
    assert!(outcome.partner_sync.is_failed());
    assert!(matches!(
        &outcome.partner_sync,
        PartnerSync::Failed { partner_id: Some(id), .. } if id == "partner"
    ));

    assert!(store.get_record("buyer").unwrap().is_premium);
    assert!(!store.get_record("partner").unwrap().is_premium);

    let events = audit.events().await;
    assert!(events.iter().any(|e| matches!(e, EntitlementAuditEvent::PartnerSyncFailed { .. })));
}

#[tokio::test]
async fn test_resync_repairs_failed_partner_sync() {
    let store = couple();
    store.inject(StoreFault::MissingGrantProcedure);
    store.inject(StoreFault::WritesFor("partner".to_string()));
    let (reconciler, _) = reconciler(&store);

    let outcome = reconciler.save_purchase("buyer", &monthly("txn-1"), PremiumPlan::Monthly).await.unwrap();
    assert!(outcome.partner_sync.is_failed());

    store.clear_faults();
    let sync = reconciler.resync_partner("buyer").await.unwrap();
    assert_eq!(sync, PartnerSync::Synced { partner_id: "partner".to_string() });

    let partner = store.get_record("partner").unwrap();
    assert_eq!(partner.premium_expires_at, Some(ts("2026-02-28T10:00:00Z")));
    assert_eq!(partner.premium_granted_by.as_deref(), Some("buyer"));
}

#[tokio::test]
async fn test_resync_from_copied_grant_is_refused() {
    let store = couple();
    let (reconciler, _) = reconciler(&store);
    reconciler.save_purchase("buyer", &monthly("txn-1"), PremiumPlan::Monthly).await.unwrap();

    assert!(matches!(
        reconciler.resync_partner("partner").await,
        Err(EntitlementError::NothingToSync { .. })
    ));
}

#[tokio::test]
async fn test_procedure_failure_writes_nothing() {
    let store = couple();
    store.inject(StoreFault::GrantProcedureFails);
    let (reconciler, _) = reconciler(&store);

    let result = reconciler.save_purchase("buyer", &monthly("txn-1"), PremiumPlan::Monthly).await;
    assert!(matches!(result, Err(EntitlementError::Store(StoreError::Backend { .. }))));
    assert!(store.premium_writes().is_empty());
}

#[tokio::test]
async fn test_rejected_grant_is_an_error() {
    let store = couple();
    store.inject(StoreFault::RejectGrants);
    let (reconciler, _) = reconciler(&store);

    let result = reconciler.save_purchase("buyer", &monthly("txn-1"), PremiumPlan::Monthly).await;
    assert!(matches!(result, Err(EntitlementError::GrantRejected { .. })));
}

#[tokio::test]
async fn test_invalid_input_touches_no_store() {
    let store = couple();
    store.inject(StoreFault::EntitlementReads);
    let (reconciler, _) = reconciler(&store);

    let unsupported = PurchaseReceipt::new("com.lovelinkcouples.coins.100", "txn-1");
    assert!(matches!(
        reconciler.save_purchase("buyer", &unsupported, PremiumPlan::Monthly).await,
        Err(EntitlementError::UnsupportedProduct { .. })
    ));
    assert_eq!(
        reconciler.save_purchase("buyer", &monthly("  "), PremiumPlan::Monthly).await,
        Err(EntitlementError::MissingTransactionId)
    );
    assert!(matches!(
        reconciler.save_purchase("bad\nid", &monthly("txn-1"), PremiumPlan::Monthly).await,
        Err(EntitlementError::InvalidAccountId { .. })
    ));
}

#[tokio::test]
async fn test_any_resolvable_account_id_can_purchase() {
    let store = InMemoryEntitlementStore::new();
    store.insert_account(TestAccount::builder().with_id("auth0|5f7c8ec7").build());
    let (reconciler, _) = reconciler(&store);

    let outcome = reconciler.save_purchase("auth0|5f7c8ec7", &monthly("txn-1"), PremiumPlan::Monthly).await.unwrap();
    assert_eq!(outcome.status, GrantStatus::Applied);

    let status = PremiumStatusResolver::new(store, FixedClock::at(NOW)).get_premium_status("auth0|5f7c8ec7").await;
    assert!(status.is_premium);
}

#[tokio::test]
async fn test_unknown_purchaser() {
    let (reconciler, _) = reconciler(&InMemoryEntitlementStore::new());
    assert!(matches!(
        reconciler.save_purchase("ghost", &monthly("txn-1"), PremiumPlan::Monthly).await,
        Err(EntitlementError::AccountNotFound { .. })
    ));
}

#[tokio::test]
async fn test_purchase_flow_end_to_end() {
    let store = couple();
    let (reconciler, _) = reconciler(&store);
    let client = MockPurchaseClient::new();
    client.respond_with(Ok(Some(monthly("txn-9"))));

    let outcome = reconciler.purchase("buyer", &client, PremiumPlan::Monthly).await.unwrap();
    assert_eq!(outcome.transaction_id, "txn-9");
    assert_eq!(client.connect_calls(), 1);
    assert_eq!(client.requested_products(), vec![MONTHLY_PRODUCT_ID.to_string()]);

    let status = PremiumStatusResolver::new(store, FixedClock::at(NOW)).get_premium_status("partner").await;
    assert!(status.is_premium);
    assert_eq!(status.source, Some(PremiumSource::Own));
}

#[tokio::test]
async fn test_purchase_cancelled_and_empty() {
    let store = couple();
    let (reconciler, _) = reconciler(&store);
    let client = MockPurchaseClient::new();
    client.respond_with(Err(PurchaseClientError::from_code("E_USER_CANCELLED", "dismissed")));
    client.respond_with(Ok(None));

    assert_eq!(
        reconciler.purchase("buyer", &client, PremiumPlan::Yearly).await,
        Err(EntitlementError::PurchaseCancelled)
    );
    assert!(matches!(
        reconciler.purchase("buyer", &client, PremiumPlan::Yearly).await,
        Err(EntitlementError::PurchaseFailed { .. })
    ));
    assert!(store.premium_writes().is_empty());
}

#[tokio::test]
async fn test_restore_uses_first_subscription() {
    let store = couple();
    let (reconciler, _) = reconciler(&store);
    let client = MockPurchaseClient::new();
    client.add_available(PurchaseReceipt::new("com.lovelinkcouples.coins.100", "txn-0"));
    client.add_available(PurchaseReceipt::new(YEARLY_PRODUCT_ID, "txn-1"));

    let outcome = reconciler.restore_purchases("buyer", &client).await.unwrap().unwrap();
    assert_eq!(outcome.plan, Some(PremiumPlan::Yearly));
    assert_eq!(outcome.expires_at, Some(ts("2027-01-31T10:00:00Z")));

    let empty = MockPurchaseClient::new();
    assert_eq!(reconciler.restore_purchases("buyer", &empty).await.unwrap(), None);
}
