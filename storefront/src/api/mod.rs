//! Remote storefront API: error type, client traits and the HTTP implementation.
//!
//! Reducers never talk HTTP directly. Their environments hold `Arc<dyn …Api>`
//! trait objects, so tests swap in scripted implementations and the binary
//! wires in [`HttpStorefrontApi`].

use crate::account::{AuthResponse, LoginRequest, RegisterRequest, UserSummary};
use crate::catalog::{NewProduct, Product};
use crate::order::{NewOrder, Order, OrderStatus};
use crate::types::{OrderId, ProductId, UserId};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

mod http;

pub use http::HttpStorefrontApi;

/// Boxed future returned by every API call
///
/// Explicit `Pin<Box<dyn Future>>` keeps the traits object safe, which the
/// reducers need to capture `Arc<dyn OrderApi>` inside effects.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Errors produced by a remote API call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No bearer token is stored, so an authenticated call was not attempted.
    #[error("You need to sign in first")]
    MissingCredentials,

    /// The request never produced an HTTP response.
    #[error("Request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    ///
    /// `message` is the `message` field of the error body, or the
    /// operation's fallback text when the body carries none.
    #[error("{message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// User-facing message
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("Response parsing failed: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status for server errors
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided message, or `fallback` for every other failure
    #[must_use]
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            Self::Server { message, .. } => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

/// Order endpoints (`/orders`)
pub trait OrderApi: Send + Sync {
    /// `POST /orders`
    fn place_order(&self, order: NewOrder) -> ApiFuture<'_, Order>;

    /// `GET /orders/my-orders`
    fn fetch_user_orders(&self) -> ApiFuture<'_, Vec<Order>>;

    /// `GET /orders` (admin)
    fn fetch_all_orders(&self) -> ApiFuture<'_, Vec<Order>>;

    /// `GET /orders/{id}`
    fn fetch_order(&self, order_id: OrderId) -> ApiFuture<'_, Order>;

    /// `PUT /orders/{id}/cancel`
    fn cancel_order(&self, order_id: OrderId) -> ApiFuture<'_, ()>;

    /// `PUT /orders/{id}` with `{"newStatus": …}` (admin)
    fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> ApiFuture<'_, Order>;

    /// `DELETE /orders/{id}` (admin)
    fn delete_order(&self, order_id: OrderId) -> ApiFuture<'_, ()>;
}

/// Product endpoints (`/products`)
pub trait CatalogApi: Send + Sync {
    /// `GET /products`
    fn fetch_products(&self) -> ApiFuture<'_, Vec<Product>>;

    /// `GET /products/brand/{brand}`
    fn fetch_products_by_brand(&self, brand: String) -> ApiFuture<'_, Vec<Product>>;

    /// `GET /products/category/{category}`
    fn fetch_products_by_category(&self, category: String) -> ApiFuture<'_, Vec<Product>>;

    /// `GET /products/featured`
    fn fetch_featured_products(&self) -> ApiFuture<'_, Vec<Product>>;

    /// `GET /products/{id}`
    fn fetch_product(&self, product_id: ProductId) -> ApiFuture<'_, Product>;

    /// `POST /products` (admin)
    fn add_product(&self, product: NewProduct) -> ApiFuture<'_, Product>;

    /// `PUT /products/{id}` (admin)
    fn update_product(&self, product: Product) -> ApiFuture<'_, Product>;

    /// `PATCH /products/restock` (admin); `sizes` maps size to new stock
    fn restock_product(
        &self,
        product_id: ProductId,
        sizes: BTreeMap<String, u32>,
    ) -> ApiFuture<'_, Product>;

    /// `DELETE /products/{id}` (admin)
    fn delete_product(&self, product_id: ProductId) -> ApiFuture<'_, ()>;
}

/// User endpoints (`/users`)
pub trait AccountApi: Send + Sync {
    /// `POST /users/register`
    fn register(&self, request: RegisterRequest) -> ApiFuture<'_, AuthResponse>;

    /// `POST /users/login`
    fn login(&self, request: LoginRequest) -> ApiFuture<'_, AuthResponse>;

    /// `GET /users` (admin)
    fn fetch_users(&self) -> ApiFuture<'_, Vec<UserSummary>>;

    /// `DELETE /users/{id}` (admin)
    fn delete_user(&self, user_id: UserId) -> ApiFuture<'_, ()>;
}
