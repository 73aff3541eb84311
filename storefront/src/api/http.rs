//! `reqwest` implementation of the storefront API traits

use super::{AccountApi, ApiError, ApiFuture, CatalogApi, OrderApi};
use crate::account::{
    AuthResponse, LOGIN_FAILED, LoginRequest, REGISTRATION_FAILED, RegisterRequest, UserSummary,
};
use crate::catalog::{GENERIC_FAILURE, NewProduct, Product, RESTOCK_FAILURE};
use crate::order::{NewOrder, Order, OrderStatus};
use crate::storage::keys;
use crate::types::{OrderId, ProductId, UserId};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use storefront_core::environment::KeyValueStorage;

const PLACE_ORDER_FAILED: &str = "Failed to place order. Please try again!";
const FETCH_ORDERS_FAILED: &str = "Failed to fetch orders";
const FETCH_ORDER_FAILED: &str = "Failed to fetch order";
const CANCEL_ORDER_FAILED: &str = "Failed to cancel order.";
const UPDATE_STATUS_FAILED: &str = "Failed to update order status";
const DELETE_ORDER_FAILED: &str = "Failed to delete order";
const FETCH_USERS_FAILED: &str = "Failed to fetch users";
const DELETE_USER_FAILED: &str = "Failed to delete user";

/// Error body returned by the API
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// `{"products": [...]}`
#[derive(Deserialize)]
struct ProductList {
    products: Vec<Product>,
}

/// `{"product": {...}}`
#[derive(Deserialize)]
struct ProductEnvelope {
    product: Product,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusChange {
    new_status: OrderStatus,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Restock {
    product_id: ProductId,
    sizes: BTreeMap<String, u32>,
}

/// HTTP client for the storefront REST API
///
/// Authenticated calls read the bearer token from the `token` key of the
/// credential storage on every request, so signing in or out takes effect
/// immediately. Without a token they fail with
/// [`ApiError::MissingCredentials`] and nothing is sent.
#[derive(Clone)]
pub struct HttpStorefrontApi {
    client: Client,
    base_url: String,
    credentials: Arc<dyn KeyValueStorage>,
}

impl HttpStorefrontApi {
    /// Client for the API rooted at `base_url` (e.g. `http://localhost:5000/api`)
    #[must_use]
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_client(Client::new(), base_url, credentials)
    }

    /// Client using a preconfigured `reqwest::Client`
    #[must_use]
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        credentials: Arc<dyn KeyValueStorage>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            credentials,
        }
    }

    fn public(&self, method: Method, path: &str) -> RequestBuilder {
        tracing::debug!(%method, path, "API request");
        self.client.request(method, format!("{}/{path}", self.base_url))
    }

    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = match self.credentials.get(keys::TOKEN) {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return Err(ApiError::MissingCredentials),
            Err(error) => {
                tracing::warn!(%error, "Could not read stored token");
                return Err(ApiError::MissingCredentials);
            },
        };
        Ok(self.public(method, path).bearer_auth(token))
    }

    async fn dispatch(request: RequestBuilder, fallback: &str) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|body| body.message)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| fallback.to_string());

        tracing::debug!(status = status.as_u16(), %message, "API error response");
        Err(ApiError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch<T: DeserializeOwned>(request: RequestBuilder, fallback: &str) -> Result<T, ApiError> {
        Self::dispatch(request, fallback)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn execute(request: RequestBuilder, fallback: &str) -> Result<(), ApiError> {
        Self::dispatch(request, fallback).await.map(drop)
    }
}

impl std::fmt::Debug for HttpStorefrontApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStorefrontApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OrderApi for HttpStorefrontApi {
    fn place_order(&self, order: NewOrder) -> ApiFuture<'_, Order> {
        Box::pin(async move {
            let request = self.authorized(Method::POST, "orders")?.json(&order);
            Self::fetch(request, PLACE_ORDER_FAILED).await
        })
    }

    fn fetch_user_orders(&self) -> ApiFuture<'_, Vec<Order>> {
        Box::pin(async move {
            let request = self.authorized(Method::GET, "orders/my-orders")?;
            Self::fetch(request, FETCH_ORDERS_FAILED).await
        })
    }

    fn fetch_all_orders(&self) -> ApiFuture<'_, Vec<Order>> {
        Box::pin(async move {
            let request = self.authorized(Method::GET, "orders")?;
            Self::fetch(request, FETCH_ORDERS_FAILED).await
        })
    }

    fn fetch_order(&self, order_id: OrderId) -> ApiFuture<'_, Order> {
        Box::pin(async move {
            let request = self.authorized(Method::GET, &format!("orders/{order_id}"))?;
            Self::fetch(request, FETCH_ORDER_FAILED).await
        })
    }

    fn cancel_order(&self, order_id: OrderId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let request = self.authorized(Method::PUT, &format!("orders/{order_id}/cancel"))?;
            Self::execute(request, CANCEL_ORDER_FAILED).await
        })
    }

    fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> ApiFuture<'_, Order> {
        Box::pin(async move {
            let request = self
                .authorized(Method::PUT, &format!("orders/{order_id}"))?
                .json(&StatusChange { new_status: status });
            Self::fetch(request, UPDATE_STATUS_FAILED).await
        })
    }

    fn delete_order(&self, order_id: OrderId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let request = self.authorized(Method::DELETE, &format!("orders/{order_id}"))?;
            Self::execute(request, DELETE_ORDER_FAILED).await
        })
    }
}

impl CatalogApi for HttpStorefrontApi {
    fn fetch_products(&self) -> ApiFuture<'_, Vec<Product>> {
        Box::pin(async move {
            let request = self.public(Method::GET, "products");
            Self::fetch::<ProductList>(request, GENERIC_FAILURE)
                .await
                .map(|list| list.products)
        })
    }

    fn fetch_products_by_brand(&self, brand: String) -> ApiFuture<'_, Vec<Product>> {
        Box::pin(async move {
            let request = self.public(Method::GET, &format!("products/brand/{brand}"));
            Self::fetch::<ProductList>(request, GENERIC_FAILURE)
                .await
                .map(|list| list.products)
        })
    }

    fn fetch_products_by_category(&self, category: String) -> ApiFuture<'_, Vec<Product>> {
        Box::pin(async move {
            let request = self.public(Method::GET, &format!("products/category/{category}"));
            Self::fetch::<ProductList>(request, GENERIC_FAILURE)
                .await
                .map(|list| list.products)
        })
    }

    fn fetch_featured_products(&self) -> ApiFuture<'_, Vec<Product>> {
        Box::pin(async move {
            // Featured products come back as a bare array.
            let request = self.public(Method::GET, "products/featured");
            Self::fetch(request, GENERIC_FAILURE).await
        })
    }

    fn fetch_product(&self, product_id: ProductId) -> ApiFuture<'_, Product> {
        Box::pin(async move {
            let request = self.public(Method::GET, &format!("products/{product_id}"));
            Self::fetch::<ProductEnvelope>(request, GENERIC_FAILURE)
                .await
                .map(|envelope| envelope.product)
        })
    }

    fn add_product(&self, product: NewProduct) -> ApiFuture<'_, Product> {
        Box::pin(async move {
            let request = self.authorized(Method::POST, "products")?.json(&product);
            Self::fetch(request, GENERIC_FAILURE).await
        })
    }

    fn update_product(&self, product: Product) -> ApiFuture<'_, Product> {
        Box::pin(async move {
            let request = self
                .authorized(Method::PUT, &format!("products/{}", product.id))?
                .json(&product);
            Self::fetch(request, GENERIC_FAILURE).await
        })
    }

    fn restock_product(
        &self,
        product_id: ProductId,
        sizes: BTreeMap<String, u32>,
    ) -> ApiFuture<'_, Product> {
        Box::pin(async move {
            let request = self
                .authorized(Method::PATCH, "products/restock")?
                .json(&Restock { product_id, sizes });
            Self::fetch(request, RESTOCK_FAILURE).await
        })
    }

    fn delete_product(&self, product_id: ProductId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let request = self.authorized(Method::DELETE, &format!("products/{product_id}"))?;
            Self::execute(request, GENERIC_FAILURE).await
        })
    }
}

impl AccountApi for HttpStorefrontApi {
    fn register(&self, request: RegisterRequest) -> ApiFuture<'_, AuthResponse> {
        Box::pin(async move {
            let request = self.public(Method::POST, "users/register").json(&request);
            Self::fetch(request, REGISTRATION_FAILED).await
        })
    }

    fn login(&self, request: LoginRequest) -> ApiFuture<'_, AuthResponse> {
        Box::pin(async move {
            let request = self.public(Method::POST, "users/login").json(&request);
            Self::fetch(request, LOGIN_FAILED).await
        })
    }

    fn fetch_users(&self) -> ApiFuture<'_, Vec<UserSummary>> {
        Box::pin(async move {
            let request = self.authorized(Method::GET, "users")?;
            Self::fetch(request, FETCH_USERS_FAILED).await
        })
    }

    fn delete_user(&self, user_id: UserId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let request = self.authorized(Method::DELETE, &format!("users/{user_id}"))?;
            Self::execute(request, DELETE_USER_FAILED).await
        })
    }
}
