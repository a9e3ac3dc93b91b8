//! Scripted purchase client.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::premium::client::{PurchaseClient, PurchaseClientError, PurchaseReceipt};

type PurchaseResponse = Result<Option<PurchaseReceipt>, PurchaseClientError>;

/// Purchase client double with scripted responses.
///
/// `request_subscription` pops queued responses in order; with nothing queued
/// it fails with a store error. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockPurchaseClient {
    inner: Arc<MockPurchaseClientInner>,
}

#[derive(Debug, Default)]
struct MockPurchaseClientInner {
    connected: AtomicBool,
    fail_connect: AtomicBool,
    connect_calls: AtomicUsize,
    responses: Mutex<VecDeque<PurchaseResponse>>,
    available: Mutex<Vec<PurchaseReceipt>>,
    requested: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockPurchaseClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `connect` call fail.
    #[must_use]
    pub fn fail_connect(self) -> Self {
        self.inner.fail_connect.store(true, Ordering::SeqCst);
        self
    }

    /// Queue the result of the next `request_subscription` call.
    pub fn respond_with(&self, response: PurchaseResponse) {
        lock(&self.inner.responses).push_back(response);
    }

    /// Add a purchase to what `available_purchases` reports.
    pub fn add_available(&self, receipt: PurchaseReceipt) {
        lock(&self.inner.available).push(receipt);
    }

    /// Product IDs passed to `request_subscription`, in order.
    pub fn requested_products(&self) -> Vec<String> {
        lock(&self.inner.requested).clone()
    }

    /// Number of `connect` calls made.
    pub fn connect_calls(&self) -> usize {
        self.inner.connect_calls.load(Ordering::SeqCst)
    }

    fn require_connection(&self) -> Result<(), PurchaseClientError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(PurchaseClientError::NotConnected)
        }
    }
}

#[async_trait]
impl PurchaseClient for MockPurchaseClient {
    async fn connect(&self) -> Result<(), PurchaseClientError> {
        self.inner.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_connect.load(Ordering::SeqCst) {
            return Err(PurchaseClientError::from_code("E_SERVICE_ERROR", "store unavailable"));
        }
        self.inner.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PurchaseClientError> {
        self.inner.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn request_subscription(&self, product_id: &str) -> PurchaseResponse {
        self.require_connection()?;
        lock(&self.inner.requested).push(product_id.to_string());
        lock(&self.inner.responses).pop_front().unwrap_or_else(|| {
            Err(PurchaseClientError::from_code("E_UNKNOWN", "no scripted response"))
        })
    }

    async fn available_purchases(&self) -> Result<Vec<PurchaseReceipt>, PurchaseClientError> {
        self.require_connection()?;
        Ok(lock(&self.inner.available).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requires_connection() {
        let client = MockPurchaseClient::new();
        assert_eq!(
            client.available_purchases().await,
            Err(PurchaseClientError::NotConnected)
        );

        client.connect().await.unwrap();
        assert!(client.available_purchases().await.unwrap().is_empty());

        client.disconnect().await.unwrap();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let client = MockPurchaseClient::new();
        client.connect().await.unwrap();
        client.respond_with(Err(PurchaseClientError::Cancelled));
        client.respond_with(Ok(None));

        assert_eq!(client.request_subscription("a").await, Err(PurchaseClientError::Cancelled));
        assert_eq!(client.request_subscription("b").await, Ok(None));
        assert!(client.request_subscription("c").await.is_err());
        assert_eq!(client.requested_products(), vec!["a", "b", "c"]);
    }
}
