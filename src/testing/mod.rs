//! Testing utilities for LoveLink entitlement code
//!
//! This module provides in-memory doubles for every external collaborator
//! the engine talks to:
//! - [`InMemoryEntitlementStore`] for profiles, partnerships, moments and the
//!   grant procedure, with injectable faults
//! - [`MockPurchaseClient`] for the app-store SDK
//! - [`RecordingAuditLogger`] for asserting on audit events
//! - Fixture builders for accounts and partnerships
//!
//! # Example
//!
//! ```rust
//! use lovelink::premium::{FixedClock, PremiumStatusResolver};
//! use lovelink::testing::{InMemoryEntitlementStore, TestAccount};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = InMemoryEntitlementStore::new();
//! store.insert_account(TestAccount::builder().with_id("user-1").build());
//!
//! let resolver = PremiumStatusResolver::new(store, FixedClock::at("2026-02-28T12:00:00Z"));
//! assert!(!resolver.get_premium_status("user-1").await.is_premium);
//! # }
//! ```

mod audit;
mod client;
mod fixtures;
mod store;

pub use audit::RecordingAuditLogger;
pub use client::MockPurchaseClient;
pub use fixtures::{TestAccount, TestAccountBuilder, TestPartnership, fake};
pub use store::{InMemoryEntitlementStore, StoreFault};
