//! Input validation for entitlement operations.
//!
//! Everything here runs before the first store call, so a rejected input
//! never causes a write.

use super::client::PurchaseReceipt;
use super::error::EntitlementError;
use super::plans::is_supported_product;

/// Maximum length for account IDs.
const MAX_ACCOUNT_ID_LENGTH: usize = 256;

/// Maximum length for store transaction IDs.
const MAX_TRANSACTION_ID_LENGTH: usize = 256;

/// Validate an account ID.
///
/// Account IDs are opaque; anything the resolvers can look up is accepted
/// here too. They must:
/// - Not be empty
/// - Not exceed 256 characters
/// - Not contain control characters
///
/// # Errors
///
/// Returns `EntitlementError::InvalidAccountId` if validation fails.
pub fn validate_account_id(id: &str) -> Result<(), EntitlementError> {
    if id.is_empty() {
        return Err(EntitlementError::InvalidAccountId {
            id: id.to_string(),
            reason: "account_id cannot be empty".to_string(),
        });
    }

    if id.len() > MAX_ACCOUNT_ID_LENGTH {
        return Err(EntitlementError::InvalidAccountId {
            id: truncate_for_error(id),
            reason: format!("account_id exceeds maximum length of {}", MAX_ACCOUNT_ID_LENGTH),
        });
    }

    if id.chars().any(char::is_control) {
        return Err(EntitlementError::InvalidAccountId {
            id: sanitize_for_error(id),
            reason: "account_id contains control characters".to_string(),
        });
    }

    Ok(())
}

/// Validate a purchase receipt.
///
/// The product must be a current or legacy subscription product, and the
/// transaction ID must be present and printable.
pub fn validate_receipt(receipt: &PurchaseReceipt) -> Result<(), EntitlementError> {
    if !is_supported_product(&receipt.product_id) {
        return Err(EntitlementError::UnsupportedProduct {
            product_id: sanitize_for_error(&receipt.product_id),
        });
    }

    let txn = receipt.transaction_id.trim();
    if txn.is_empty() {
        return Err(EntitlementError::MissingTransactionId);
    }

    // Store transaction IDs vary by platform ("2000000123", "GPA.1234-5678"),
    // so only length and printability are checked.
    if txn.len() > MAX_TRANSACTION_ID_LENGTH || txn.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(EntitlementError::PurchaseFailed {
            message: format!("malformed transaction id '{}'", sanitize_for_error(txn)),
        });
    }

    Ok(())
}

/// Truncate a string for error messages to prevent log flooding.
fn truncate_for_error(s: &str) -> String {
    if s.chars().count() <= 50 {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(47).collect::<String>())
    }
}

/// Sanitize a string for error messages to prevent log injection.
fn sanitize_for_error(s: &str) -> String {
    let sanitized: String = s
        .chars()
        .take(50)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '?'
            }
        })
        .collect();

    if s.chars().count() > 50 {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
