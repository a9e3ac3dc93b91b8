//! Purchase client abstraction.
//!
//! The platform app-store SDK is an external collaborator. The engine only
//! needs a connection lifecycle, a way to request a subscription and a way to
//! list purchases the store still knows about. Clients are constructed and
//! passed in explicitly; there is no global purchase client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::EntitlementError;
use super::plans::PremiumPlan;

/// Store error codes reported when the user dismisses the purchase sheet.
const CANCELLED_CODES: &[&str] = &["E_USER_CANCELLED", "E_USER_CANCELED"];

/// A completed purchase as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub product_id: String,
    pub transaction_id: String,
    #[serde(default)]
    pub transaction_date: Option<DateTime<Utc>>,
}

impl PurchaseReceipt {
    /// Create a receipt without a transaction date.
    #[must_use]
    pub fn new(product_id: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            transaction_id: transaction_id.into(),
            transaction_date: None,
        }
    }
}

/// Errors reported by a purchase client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PurchaseClientError {
    /// The user dismissed the purchase sheet.
    #[error("purchase cancelled")]
    Cancelled,

    /// The client has no open connection to the store.
    #[error("purchase client is not connected")]
    NotConnected,

    /// The store reported a failure.
    #[error("store error {code}: {message}")]
    Store { code: String, message: String },
}

impl PurchaseClientError {
    /// Classify a raw store error code.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        if CANCELLED_CODES.contains(&code) {
            Self::Cancelled
        } else {
            Self::Store {
                code: code.to_string(),
                message: message.into(),
            }
        }
    }
}

impl From<PurchaseClientError> for EntitlementError {
    fn from(err: PurchaseClientError) -> Self {
        match err {
            PurchaseClientError::Cancelled => EntitlementError::PurchaseCancelled,
            other => EntitlementError::PurchaseFailed {
                message: other.to_string(),
            },
        }
    }
}

/// Source of purchase receipts.
#[async_trait]
pub trait PurchaseClient: Send + Sync {
    /// Open the connection to the store.
    async fn connect(&self) -> Result<(), PurchaseClientError>;

    /// Close the connection to the store.
    async fn disconnect(&self) -> Result<(), PurchaseClientError>;

    /// Check if the connection is open.
    fn is_connected(&self) -> bool;

    /// Show the purchase sheet for a subscription product.
    ///
    /// `Ok(None)` means the store finished without returning a purchase.
    async fn request_subscription(
        &self,
        product_id: &str,
    ) -> Result<Option<PurchaseReceipt>, PurchaseClientError>;

    /// Purchases the store still reports for the signed-in store account.
    async fn available_purchases(&self) -> Result<Vec<PurchaseReceipt>, PurchaseClientError>;
}

/// Connect the client unless it already is.
pub async fn ensure_connected<P: PurchaseClient + ?Sized>(client: &P) -> Result<(), PurchaseClientError> {
    if client.is_connected() {
        return Ok(());
    }
    client.connect().await
}

/// A store-side subscription found among available purchases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSubscription {
    pub plan: PremiumPlan,
    pub product_id: String,
    pub transaction_id: String,
    pub purchased_at: Option<DateTime<Utc>>,
}

impl ActiveSubscription {
    /// Build from a receipt, if the receipt is for a subscription product.
    #[must_use]
    pub fn from_receipt(receipt: &PurchaseReceipt) -> Option<Self> {
        let plan = PremiumPlan::for_product(&receipt.product_id)?;
        Some(Self {
            plan,
            product_id: receipt.product_id.clone(),
            transaction_id: receipt.transaction_id.clone(),
            purchased_at: receipt.transaction_date,
        })
    }

    /// The receipt this subscription was found in.
    #[must_use]
    pub fn receipt(&self) -> PurchaseReceipt {
        PurchaseReceipt {
            product_id: self.product_id.clone(),
            transaction_id: self.transaction_id.clone(),
            transaction_date: self.purchased_at,
        }
    }
}

/// Find the first subscription among the store's available purchases.
///
/// This only reflects what the store reports on this device; durable
/// entitlement state comes from reconciling the receipt.
pub async fn check_active_subscription<P: PurchaseClient + ?Sized>(
    client: &P,
) -> Result<Option<ActiveSubscription>, PurchaseClientError> {
    ensure_connected(client).await?;

    let purchases = client.available_purchases().await?;
    Ok(purchases.iter().find_map(ActiveSubscription::from_receipt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::premium::plans::{MONTHLY_PRODUCT_ID, YEARLY_PRODUCT_ID};
    use crate::testing::MockPurchaseClient;

    #[test]
    fn test_error_from_code() {
        assert_eq!(PurchaseClientError::from_code("E_USER_CANCELLED", "x"), PurchaseClientError::Cancelled);
        assert_eq!(PurchaseClientError::from_code("E_USER_CANCELED", "x"), PurchaseClientError::Cancelled);
        assert!(matches!(
            PurchaseClientError::from_code("E_SERVICE_ERROR", "down"),
            PurchaseClientError::Store { .. }
        ));
    }

    #[test]
    fn test_error_into_entitlement_error() {
        assert_eq!(
            EntitlementError::from(PurchaseClientError::Cancelled),
            EntitlementError::PurchaseCancelled
        );
        assert!(matches!(
            EntitlementError::from(PurchaseClientError::NotConnected),
            EntitlementError::PurchaseFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_check_active_subscription_connects_and_skips_other_products() {
        let client = MockPurchaseClient::new();
        client.add_available(PurchaseReceipt::new("com.lovelinkcouples.coins.100", "txn-0"));
        client.add_available(PurchaseReceipt::new(YEARLY_PRODUCT_ID, "txn-1"));
        client.add_available(PurchaseReceipt::new(MONTHLY_PRODUCT_ID, "txn-2"));

        let active = check_active_subscription(&client).await.unwrap().unwrap();
        assert!(client.is_connected());
        assert_eq!(active.plan, PremiumPlan::Yearly);
        assert_eq!(active.transaction_id, "txn-1");
        assert_eq!(active.receipt().product_id, YEARLY_PRODUCT_ID);
    }

    #[tokio::test]
    async fn test_check_active_subscription_none() {
        let client = MockPurchaseClient::new();
        assert_eq!(check_active_subscription(&client).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_connect_failure_propagates() {
        let client = MockPurchaseClient::new().fail_connect();
        let result = check_active_subscription(&client).await;
        assert!(matches!(result, Err(PurchaseClientError::Store { .. })));
    }
}
