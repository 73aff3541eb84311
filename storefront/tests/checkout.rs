//! Integration tests for checkout: cart → order

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::{FakeBackend, TIMEOUT, address, line};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use storefront::api::ApiError;
use storefront::storage::keys;
use storefront::{CartStore, CheckoutError, OrderWorkflow, ShippingAddress, WorkflowError, checkout};
use storefront_testing::{FailingStorage, InMemoryStorage};

#[tokio::test]
async fn successful_checkout_places_the_order_and_clears_the_cart() {
    let backend = FakeBackend::new();
    let orders = OrderWorkflow::new(backend.clone(), TIMEOUT);
    let storage = InMemoryStorage::new();
    let mut cart = CartStore::hydrate(Arc::new(storage.clone()));
    cart.add(line("P1", "42", 2, 100)).unwrap();
    cart.add(line("P2", "40", 1, 80)).unwrap();

    let order = checkout(&mut cart, &orders, address()).await.unwrap();

    assert_eq!(order.total_price, Decimal::from(280));
    assert_eq!(order.order_items.len(), 2);
    assert_eq!(order.order_items[0].quantity, 2);
    let payment = order.payment_details.as_ref().unwrap();
    assert!(payment.transaction_id.starts_with("TEST_"));
    assert_eq!(payment.method, "Credit Card");

    assert!(cart.is_empty());
    assert_eq!(storage.raw(keys::CART_ITEMS).as_deref(), Some("[]"));
    assert_eq!(orders.my_orders().await, vec![order]);
}

#[tokio::test]
async fn failed_order_keeps_the_cart() {
    let backend = FakeBackend::new();
    backend.fail_with(ApiError::Transport("connection refused".into()));
    let orders = OrderWorkflow::new(backend.clone(), TIMEOUT);
    let mut cart = CartStore::hydrate(Arc::new(InMemoryStorage::new()));
    cart.add(line("P1", "42", 1, 100)).unwrap();

    let error = checkout(&mut cart, &orders, address()).await.unwrap_err();

    assert!(matches!(
        error,
        CheckoutError::Workflow(WorkflowError::Order(_))
    ));
    assert_eq!(cart.len(), 1);
    assert_eq!(cart.total(), Decimal::from(100));
}

#[tokio::test]
async fn empty_cart_never_reaches_the_server() {
    let backend = FakeBackend::new();
    let orders = OrderWorkflow::new(backend.clone(), TIMEOUT);
    let mut cart = CartStore::hydrate(Arc::new(InMemoryStorage::new()));

    let error = checkout(&mut cart, &orders, address()).await.unwrap_err();

    assert_eq!(error, CheckoutError::EmptyCart);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn incomplete_address_never_reaches_the_server() {
    let backend = FakeBackend::new();
    let orders = OrderWorkflow::new(backend.clone(), TIMEOUT);
    let mut cart = CartStore::hydrate(Arc::new(InMemoryStorage::new()));
    cart.add(line("P1", "42", 1, 100)).unwrap();

    let shipping = ShippingAddress {
        city: "  ".into(),
        ..address()
    };
    let error = checkout(&mut cart, &orders, shipping).await.unwrap_err();

    assert_eq!(error, CheckoutError::IncompleteAddress);
    assert!(backend.calls().is_empty());
    assert_eq!(cart.len(), 1);
}

#[tokio::test]
async fn order_counts_as_placed_when_the_empty_cart_cannot_be_saved() {
    let backend = FakeBackend::new();
    let orders = OrderWorkflow::new(backend.clone(), TIMEOUT);
    let mut cart = CartStore::hydrate(Arc::new(FailingStorage::new()));
    // Persisting fails but the line is in the ledger.
    assert!(cart.add(line("P1", "42", 1, 100)).is_err());

    let order = checkout(&mut cart, &orders, address()).await.unwrap();

    assert_eq!(backend.orders(), vec![order]);
    assert!(cart.is_empty());
}

#[tokio::test]
async fn slow_server_is_waited_for_and_the_cart_cleared() {
    let backend = FakeBackend::new();
    let orders = OrderWorkflow::new(backend.clone(), None);
    let mut cart = CartStore::hydrate(Arc::new(InMemoryStorage::new()));
    cart.add(line("P1", "42", 1, 100)).unwrap();
    let gate = backend.hold();

    let (placed, ()) = tokio::join!(checkout(&mut cart, &orders, address()), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        gate.notify_one();
    });

    let order = placed.unwrap();
    assert!(cart.is_empty());
    assert_eq!(backend.orders(), vec![order.clone()]);
    assert_eq!(orders.my_orders().await, vec![order]);
}
