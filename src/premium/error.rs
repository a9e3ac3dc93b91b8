//! Entitlement-specific error types.
//!
//! Two layers live here:
//!
//! - [`StoreError`] is what the external stores report. It keeps the
//!   "row not found", "column does not exist" and "procedure does not exist"
//!   classes apart from generic backend faults so resolvers can decide which
//!   failures are benign schema-evolution signals.
//! - [`EntitlementError`] is what the engine reports to its callers.

use std::fmt;

/// Backend error codes that mean "no row matched a single-row read".
const NOT_FOUND_CODES: &[&str] = &["PGRST116"];

/// Backend error codes that mean "a selected column does not exist".
const MISSING_COLUMN_CODES: &[&str] = &["42703"];

/// Backend error codes that mean "the called procedure does not exist".
const MISSING_PROCEDURE_CODES: &[&str] = &["PGRST202", "42883"];

/// Errors reported by the profile, partnership, moments and grant stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A single-row read or write matched no row.
    #[error("row not found")]
    NotFound,

    /// The requested column is not present in the deployed schema.
    #[error("column '{column}' does not exist")]
    MissingColumn { column: String },

    /// The requested stored procedure is not deployed.
    #[error("procedure '{name}' does not exist")]
    MissingProcedure { name: String },

    /// Any other failure: network, permissions, constraint violations.
    #[error("{message}")]
    Backend {
        code: Option<String>,
        message: String,
    },
}

impl StoreError {
    /// Create a generic backend error without a code.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            code: None,
            message: message.into(),
        }
    }

    /// Classify a raw backend error code and message.
    ///
    /// Store adapters call this once so that the rest of the engine never
    /// inspects codes or message text.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();

        if NOT_FOUND_CODES.contains(&code) {
            return Self::NotFound;
        }

        if MISSING_COLUMN_CODES.contains(&code) {
            return Self::MissingColumn {
                column: extract_quoted_name(&message, "column").unwrap_or_default(),
            };
        }

        if MISSING_PROCEDURE_CODES.contains(&code) {
            return Self::MissingProcedure {
                name: extract_quoted_name(&message, "function").unwrap_or_default(),
            };
        }

        Self::Backend {
            code: Some(code.to_string()),
            message,
        }
    }

    /// The backend code, if one was reported.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Backend { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Pull `name` out of messages like `column profiles.name does not exist`.
fn extract_quoted_name(message: &str, keyword: &str) -> Option<String> {
    let rest = message.split_once(keyword)?.1.trim_start();
    let token = rest.split_whitespace().next()?;
    let token = token.split('(').next().unwrap_or(token);
    let token = token.trim_matches(|c| c == '"' || c == '\'');
    let name = token.rsplit('.').next().unwrap_or(token);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Entitlement-specific errors.
///
/// Validation errors are returned before anything is written. Store errors
/// carry the original [`StoreError`] so callers can tell an outage from a
/// missing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementError {
    // Validation errors
    /// The account ID is invalid.
    InvalidAccountId { id: String, reason: String },
    /// The product ID is not one of the known subscription products.
    UnsupportedProduct { product_id: String },
    /// The plan is not `monthly` or `yearly`.
    InvalidPlan { plan: String },
    /// The purchase receipt carries no transaction ID.
    MissingTransactionId,

    // Account errors
    /// No entitlement record exists for the account.
    AccountNotFound { account_id: String },

    // Grant errors
    /// The server-side grant procedure refused the purchase.
    GrantRejected { reason: String },
    /// The purchaser has no grant to copy to a partner.
    NothingToSync { account_id: String },

    // Purchase client errors
    /// The purchase sheet was dismissed by the user.
    PurchaseCancelled,
    /// The purchase client reported a failure.
    PurchaseFailed { message: String },

    // Store errors
    /// The backing store failed.
    Store(StoreError),
}

impl fmt::Display for EntitlementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAccountId { id, reason } => {
                write!(f, "Invalid account ID '{}': {}", id, reason)
            }
            Self::UnsupportedProduct { product_id } => {
                write!(f, "Unsupported subscription product id: {}", product_id)
            }
            Self::InvalidPlan { plan } => {
                write!(f, "Invalid premium plan: {}", plan)
            }
            Self::MissingTransactionId => {
                write!(f, "Invalid purchase: no transaction id")
            }
            Self::AccountNotFound { account_id } => {
                write!(f, "No entitlement record for account '{}'", account_id)
            }
            Self::GrantRejected { reason } => {
                write!(f, "Premium grant rejected: {}", reason)
            }
            Self::NothingToSync { account_id } => {
                write!(f, "Account '{}' has no premium grant to share", account_id)
            }
            Self::PurchaseCancelled => write!(f, "Purchase cancelled"),
            Self::PurchaseFailed { message } => {
                write!(f, "Purchase failed: {}", message)
            }
            Self::Store(err) => write!(f, "Entitlement store error: {}", err),
        }
    }
}

impl std::error::Error for EntitlementError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for EntitlementError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<EntitlementError> for crate::error::LoveLinkError {
    fn from(err: EntitlementError) -> Self {
        match err {
            EntitlementError::Store(store) => crate::error::LoveLinkError::Store(store),
            other => crate::error::LoveLinkError::Entitlement(other),
        }
    }
}

impl EntitlementError {
    /// Check if this error was caused by bad caller input.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAccountId { .. }
                | Self::UnsupportedProduct { .. }
                | Self::InvalidPlan { .. }
                | Self::MissingTransactionId
        )
    }

    /// Check if this is a client error.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.is_validation_error()
            || matches!(
                self,
                Self::AccountNotFound { .. }
                    | Self::GrantRejected { .. }
                    | Self::NothingToSync { .. }
                    | Self::PurchaseCancelled
            )
    }

    /// Check if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Backend { .. }) | Self::PurchaseFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_classification() {
        assert_eq!(StoreError::from_code("PGRST116", "no rows"), StoreError::NotFound);

        assert_eq!(
            StoreError::from_code("42703", "column profiles.trial_access_bypass does not exist"),
            StoreError::MissingColumn {
                column: "trial_access_bypass".to_string()
            }
        );

        assert_eq!(
            StoreError::from_code(
                "PGRST202",
                "Could not find the function public.grant_premium_from_iap(p_plan) in the schema cache"
            ),
            StoreError::MissingProcedure {
                name: "grant_premium_from_iap".to_string()
            }
        );
        assert!(matches!(
            StoreError::from_code("42883", "function grant_premium_from_iap does not exist"),
            StoreError::MissingProcedure { .. }
        ));

        let err = StoreError::from_code("PGRST999", "db unavailable");
        assert_eq!(err.code(), Some("PGRST999"));
        assert_eq!(err.to_string(), "db unavailable");
    }

    #[test]
    fn test_extract_name_tolerates_odd_messages() {
        assert_eq!(
            StoreError::from_code("42703", "something went wrong"),
            StoreError::MissingColumn {
                column: String::new()
            }
        );
    }

    #[test]
    fn test_error_display() {
        let err = EntitlementError::UnsupportedProduct {
            product_id: "com.example.coins".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported subscription product id: com.example.coins"
        );

        let err = EntitlementError::InvalidPlan {
            plan: "weekly".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid premium plan: weekly");
    }

    #[test]
    fn test_error_classification() {
        let err = EntitlementError::InvalidPlan {
            plan: "lifetime".to_string(),
        };
        assert!(err.is_validation_error());
        assert!(err.is_client_error());
        assert!(!err.is_retryable());

        let err = EntitlementError::Store(StoreError::backend("timeout"));
        assert!(!err.is_client_error());
        assert!(err.is_retryable());

        let err = EntitlementError::Store(StoreError::NotFound);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_convert_to_lovelink_error() {
        let err: crate::error::LoveLinkError =
            EntitlementError::Store(StoreError::backend("down")).into();
        assert!(matches!(err, crate::error::LoveLinkError::Store(_)));

        let err: crate::error::LoveLinkError = EntitlementError::MissingTransactionId.into();
        assert!(matches!(
            err.entitlement_error(),
            Some(EntitlementError::MissingTransactionId)
        ));
    }
}
