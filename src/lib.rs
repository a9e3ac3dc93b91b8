//! LoveLink - entitlement resolution for a couples app
//!
//! Decides which accounts may use gated features. One subscription covers
//! both partners of a couple, every new account gets a fixed free trial, and
//! store purchases are reconciled into durable entitlement state with a
//! client-side fallback when the server-side grant procedure is missing.
//!
//! # Features
//!
//! - **Premium status**: own grant first, then the linked partner's
//! - **Trial access**: fixed window from account creation, with an
//!   administrative bypass and schema-evolution fallback
//! - **Feature gate**: concrete limits (photo ceiling, pulse patterns)
//! - **Purchase reconciliation**: idempotent, with best-effort partner sync
//! - **Testing**: in-memory stores and purchase client doubles
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lovelink::premium::{EntitlementEngine, SystemClock};
//! use lovelink::testing::InMemoryEntitlementStore;
//! use lovelink::ConfigBuilder;
//!
//! #[tokio::main]
//! async fn main() -> lovelink::Result<()> {
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     lovelink::init_tracing_with_config(&config);
//!
//!     let store = InMemoryEntitlementStore::new();
//!     let engine = EntitlementEngine::with_config(store, SystemClock, &config.premium);
//!
//!     let status = engine.get_trial_access_status("user-1").await;
//!     println!("access: {}", status.has_access);
//!     Ok(())
//! }
//! ```

#![allow(async_fn_in_trait)] // async_trait macro handles Send/Sync bounds properly

mod config;
mod error;
pub mod premium;
pub mod testing;
pub mod utils;

pub use config::{Config, ConfigBuilder, LoggingConfig, PremiumConfig};
pub use error::{LoveLinkError, Result};
pub use testing::fake;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main()
/// before building the engine.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "lovelink::premium=debug")
/// - `LOVELINK_LOG_JSON`: Set to "true" for JSON formatted logs
///
/// # Example
///
/// ```rust,no_run
/// use lovelink;
///
/// #[tokio::main]
/// async fn main() {
///     lovelink::init_tracing();
///     // ... rest of your app
/// }
/// ```
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = utils::parse_env_with_prefix::<bool>("LOG_JSON").unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
