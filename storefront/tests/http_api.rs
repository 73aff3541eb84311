//! Integration tests for the HTTP client against a mock storefront server

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use storefront::account::LoginRequest;
use storefront::api::{ApiError, CatalogApi, OrderApi};
use storefront::storage::keys;
use storefront::{
    AuthService, FileStorage, HttpStorefrontApi, OrderId, OrderStatus, ProductId, SessionUser,
    UserId,
};
use storefront_core::environment::KeyValueStorage;
use storefront_testing::InMemoryStorage;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn server_order(id: &str, status: &str) -> serde_json::Value {
    json!({
        "_id": id,
        "user": "u1",
        "orderItems": [{
            "product": "P1",
            "size": "42",
            "quantity": 2,
            "price": 100,
            "name": "Runner",
            "imageUrl": "runner.png"
        }],
        "shippingAddress": {
            "address": "1 Main Street",
            "city": "Oslo",
            "postalCode": "0150",
            "country": "Norway"
        },
        "paymentDetails": { "transactionId": "TEST_42", "method": "Credit Card" },
        "paymentMethod": "Credit Card",
        "totalPrice": 200,
        "orderStatus": status,
        "createdAt": "2025-01-01T10:00:00.000Z",
        "__v": 0
    })
}

fn server_product(id: &str) -> serde_json::Value {
    json!({
        "_id": id,
        "name": "Runner",
        "description": "Daily trainer",
        "price": 89.5,
        "imageUrl": "runner.png",
        "brand": "Asics",
        "category": "men",
        "sizes": { "42": 3 }
    })
}

async fn client(token: Option<&str>) -> (MockServer, HttpStorefrontApi) {
    let server = MockServer::start().await;
    let storage = InMemoryStorage::new();
    if let Some(token) = token {
        storage.set(keys::TOKEN, token).unwrap();
    }
    let api = HttpStorefrontApi::new(format!("{}/api/", server.uri()), Arc::new(storage));
    (server, api)
}

#[tokio::test]
async fn authorized_calls_send_the_stored_bearer_token() {
    let (server, api) = client(Some("jwt-123")).await;
    Mock::given(method("GET"))
        .and(path("/api/orders/my-orders"))
        .and(header("authorization", "Bearer jwt-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            server_order("o1", "Pending"),
            server_order("o2", "Shipped"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let orders = api.fetch_user_orders().await.unwrap();

    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, OrderId::new("o1"));
    assert_eq!(orders[1].order_status, OrderStatus::Shipped);
    assert_eq!(orders[0].total_price, Decimal::from(200));
    assert_eq!(orders[0].order_items[0].product, ProductId::new("P1"));
    assert_eq!(orders[0].user, Some(UserId::new("u1")));
}

#[tokio::test]
async fn missing_token_fails_without_sending() {
    let (server, api) = client(None).await;

    let error = api.fetch_all_orders().await.unwrap_err();

    assert_eq!(error, ApiError::MissingCredentials);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn error_body_message_is_surfaced() {
    let (server, api) = client(Some("t")).await;
    Mock::given(method("GET"))
        .and(path("/api/orders/o9"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "Order not found" })),
        )
        .mount(&server)
        .await;

    let error = api.fetch_order(OrderId::new("o9")).await.unwrap_err();

    assert_eq!(
        error,
        ApiError::Server {
            status: 404,
            message: "Order not found".into()
        }
    );
}

#[tokio::test]
async fn error_without_message_uses_the_operation_fallback() {
    let (server, api) = client(Some("t")).await;
    Mock::given(method("PUT"))
        .and(path("/api/orders/o1/cancel"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let error = api.cancel_order(OrderId::new("o1")).await.unwrap_err();

    assert_eq!(error.status(), Some(500));
    assert_eq!(error.to_string(), "Failed to cancel order.");
}

#[tokio::test]
async fn status_update_sends_new_status() {
    let (server, api) = client(Some("t")).await;
    Mock::given(method("PUT"))
        .and(path("/api/orders/o1"))
        .and(body_json(json!({ "newStatus": "Shipped" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_order("o1", "Shipped")))
        .expect(1)
        .mount(&server)
        .await;

    let order = api
        .update_order_status(OrderId::new("o1"), OrderStatus::Shipped)
        .await
        .unwrap();

    assert_eq!(order.order_status, OrderStatus::Shipped);
}

#[tokio::test]
async fn product_endpoints_unwrap_their_envelopes() {
    let (server, api) = client(None).await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "products": [server_product("P1"), server_product("P2")] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/products/featured"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([server_product("P1")])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/products/P2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "product": server_product("P2") })),
        )
        .mount(&server)
        .await;

    assert_eq!(api.fetch_products().await.unwrap().len(), 2);
    assert_eq!(api.fetch_featured_products().await.unwrap().len(), 1);

    let product = api.fetch_product(ProductId::new("P2")).await.unwrap();
    assert_eq!(product.id, ProductId::new("P2"));
    assert_eq!(product.price, Decimal::new(895, 1));
}

#[tokio::test]
async fn restock_patches_product_sizes() {
    let (server, api) = client(Some("t")).await;
    Mock::given(method("PATCH"))
        .and(path("/api/products/restock"))
        .and(body_json(json!({ "productId": "P1", "sizes": { "42": 7 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(server_product("P1")))
        .expect(1)
        .mount(&server)
        .await;

    let sizes = [("42".to_string(), 7)].into_iter().collect();
    let product = api.restock_product(ProductId::new("P1"), sizes).await.unwrap();

    assert_eq!(product.id, ProductId::new("P1"));
}

#[tokio::test]
async fn login_persists_the_session_used_by_later_calls() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::open(dir.path()).unwrap());
    let api = Arc::new(HttpStorefrontApi::new(
        format!("{}/api", server.uri()),
        Arc::clone(&storage),
    ));

    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .and(body_json(json!({ "email": "me@example.com", "password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "jwt-abc",
            "userId": "u1",
            "isAdmin": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(header("authorization", "Bearer jwt-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "u1", "username": "admin", "email": "me@example.com", "isAdmin": true }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut auth = AuthService::new(api.clone(), Arc::clone(&storage));
    let user = auth
        .login(LoginRequest {
            email: "me@example.com".into(),
            password: "secret".into(),
        })
        .await
        .unwrap();

    assert!(user.is_admin);
    assert_eq!(storage.get(keys::TOKEN).unwrap().as_deref(), Some("jwt-abc"));
    assert_eq!(auth.fetch_all_users().await.unwrap()[0].username, "admin");

    // A fresh service over the same directory picks the session up.
    let restored = AuthService::new(api, Arc::clone(&storage));
    assert_eq!(
        restored.user(),
        Some(&SessionUser {
            user_id: UserId::new("u1"),
            is_admin: true
        })
    );
}

#[tokio::test]
async fn refused_login_records_the_fallback_message() {
    let server = MockServer::start().await;
    let storage: Arc<dyn KeyValueStorage> = Arc::new(InMemoryStorage::new());
    let api = Arc::new(HttpStorefrontApi::new(
        format!("{}/api", server.uri()),
        Arc::clone(&storage),
    ));
    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut auth = AuthService::new(api, Arc::clone(&storage));
    let error = auth
        .login(LoginRequest {
            email: "me@example.com".into(),
            password: "wrong".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(error.to_string(), "Login failed");
    assert_eq!(auth.error(), Some("Login failed"));
    assert_eq!(auth.user(), None);
    assert_eq!(storage.get(keys::TOKEN).unwrap(), None);
}
