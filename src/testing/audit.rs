//! Audit logger that captures events.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::premium::audit::{EntitlementAuditEvent, EntitlementAuditLogger};

/// Audit logger that records every event in memory.
///
/// Clones share the same event list.
#[derive(Debug, Clone, Default)]
pub struct RecordingAuditLogger {
    events: Arc<Mutex<Vec<EntitlementAuditEvent>>>,
}

impl RecordingAuditLogger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far, oldest first.
    pub async fn events(&self) -> Vec<EntitlementAuditEvent> {
        self.events.lock().await.clone()
    }

    /// Drop all recorded events.
    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

impl EntitlementAuditLogger for RecordingAuditLogger {
    async fn log(&self, event: EntitlementAuditEvent) {
        self.events.lock().await.push(event);
    }
}
