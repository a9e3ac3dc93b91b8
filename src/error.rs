use crate::premium::error::{EntitlementError, StoreError};

/// The main error type for LoveLink entitlement operations
#[derive(Debug, thiserror::Error)]
pub enum LoveLinkError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Entitlement(EntitlementError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl LoveLinkError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The store error behind this failure, if any.
    ///
    /// Looks through `Entitlement` wrappers so callers can inspect the
    /// original store classification.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(err) => Some(err),
            Self::Entitlement(EntitlementError::Store(err)) => Some(err),
            _ => None,
        }
    }

    /// The entitlement error behind this failure, if any.
    pub fn entitlement_error(&self) -> Option<&EntitlementError> {
        match self {
            Self::Entitlement(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for LoveLink operations
pub type Result<T> = std::result::Result<T, LoveLinkError>;

impl From<serde_json::Error> for LoveLinkError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            LoveLinkError::BadRequest(format!("JSON error: {}", err))
        } else {
            LoveLinkError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}
