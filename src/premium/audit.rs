//! Audit logging for entitlement changes.
//!
//! Every purchase reconciliation emits events through an
//! [`EntitlementAuditLogger`]. A failed partner sync is only visible here
//! and in the returned outcome, so operators should route these events
//! somewhere durable.

use std::fmt;

/// Audit event types for entitlement operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementAuditEvent {
    /// Premium granted to the purchaser.
    PurchaseGranted {
        account_id: String,
        transaction_id: String,
        plan: String,
        via_procedure: bool,
    },
    /// A purchase event for an already-applied transaction was ignored.
    PurchaseReplayed {
        account_id: String,
        transaction_id: String,
    },
    /// The atomic grant procedure was missing; the client-side path ran.
    GrantProcedureUnavailable { account_id: String },
    /// Premium copied to the purchaser's partner.
    PartnerSynced {
        account_id: String,
        partner_id: String,
    },
    /// Premium could not be copied to the purchaser's partner.
    PartnerSyncFailed {
        account_id: String,
        partner_id: Option<String>,
        error: String,
    },
}

impl fmt::Display for EntitlementAuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PurchaseGranted { account_id, transaction_id, plan, via_procedure } => {
                write!(f, "Purchase granted: account={}, txn={}, plan={}, procedure={}", account_id, transaction_id, plan, via_procedure)
            }
            Self::PurchaseReplayed { account_id, transaction_id } => {
                write!(f, "Purchase replay ignored: account={}, txn={}", account_id, transaction_id)
            }
            Self::GrantProcedureUnavailable { account_id } => {
                write!(f, "Grant procedure unavailable, using client path: account={}", account_id)
            }
            Self::PartnerSynced { account_id, partner_id } => {
                write!(f, "Partner synced: account={}, partner={}", account_id, partner_id)
            }
            Self::PartnerSyncFailed { account_id, partner_id, error } => {
                write!(
                    f,
                    "Partner sync failed: account={}, partner={}, error={}",
                    account_id,
                    partner_id.as_deref().unwrap_or("unresolved"),
                    error
                )
            }
        }
    }
}

/// Trait for audit logging backends.
#[allow(async_fn_in_trait)]
pub trait EntitlementAuditLogger: Send + Sync {
    /// Log an entitlement audit event.
    ///
    /// Must not fail; a logging problem must never undo a grant.
    async fn log(&self, event: EntitlementAuditEvent);
}

/// Audit logger that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuditLogger;

impl EntitlementAuditLogger for NoOpAuditLogger {
    async fn log(&self, _event: EntitlementAuditEvent) {}
}

/// Audit logger that writes events through `tracing`.
///
/// Partner sync failures are logged at WARN, everything else at INFO.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

impl EntitlementAuditLogger for TracingAuditLogger {
    async fn log(&self, event: EntitlementAuditEvent) {
        if matches!(event, EntitlementAuditEvent::PartnerSyncFailed { .. }) {
            tracing::warn!(
                target: "lovelink::audit",
                event_type = %event_kind(&event),
                "{}", event
            );
        } else {
            tracing::info!(
                target: "lovelink::audit",
                event_type = %event_kind(&event),
                "{}", event
            );
        }
    }
}

/// Get the event kind as a string for structured logging.
pub fn event_kind(event: &EntitlementAuditEvent) -> &'static str {
    match event {
        EntitlementAuditEvent::PurchaseGranted { .. } => "purchase_granted",
        EntitlementAuditEvent::PurchaseReplayed { .. } => "purchase_replayed",
        EntitlementAuditEvent::GrantProcedureUnavailable { .. } => "grant_procedure_unavailable",
        EntitlementAuditEvent::PartnerSynced { .. } => "partner_synced",
        EntitlementAuditEvent::PartnerSyncFailed { .. } => "partner_sync_failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingAuditLogger;

    #[tokio::test]
    async fn test_noop_logger() {
        let logger = NoOpAuditLogger;
        logger
            .log(EntitlementAuditEvent::GrantProcedureUnavailable {
                account_id: "user-1".to_string(),
            })
            .await;
    }

    #[tokio::test]
    async fn test_tracing_logger() {
        let logger = TracingAuditLogger;
        logger
            .log(EntitlementAuditEvent::PartnerSyncFailed {
                account_id: "user-1".to_string(),
                partner_id: None,
                error: "timeout".to_string(),
            })
            .await;
    }

    #[tokio::test]
    async fn test_recording_logger() {
        let logger = RecordingAuditLogger::new();

        logger
            .log(EntitlementAuditEvent::PurchaseGranted {
                account_id: "user-1".to_string(),
                transaction_id: "txn-1".to_string(),
                plan: "monthly".to_string(),
                via_procedure: true,
            })
            .await;
        logger
            .log(EntitlementAuditEvent::PartnerSynced {
                account_id: "user-1".to_string(),
                partner_id: "user-2".to_string(),
            })
            .await;

        let events = logger.events().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], EntitlementAuditEvent::PurchaseGranted { .. }));
        assert!(matches!(events[1], EntitlementAuditEvent::PartnerSynced { .. }));
    }

    #[test]
    fn test_event_display() {
        let event = EntitlementAuditEvent::PartnerSyncFailed {
            account_id: "user-1".to_string(),
            partner_id: None,
            error: "db unavailable".to_string(),
        };
        let display = event.to_string();
        assert!(display.contains("user-1"));
        assert!(display.contains("unresolved"));
        assert!(display.contains("db unavailable"));
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(
            event_kind(&EntitlementAuditEvent::PurchaseReplayed {
                account_id: String::new(),
                transaction_id: String::new(),
            }),
            "purchase_replayed"
        );
        assert_eq!(
            event_kind(&EntitlementAuditEvent::GrantProcedureUnavailable {
                account_id: String::new(),
            }),
            "grant_procedure_unavailable"
        );
    }
}
