//! Shared fixtures for storefront integration tests
//!
//! [`FakeBackend`] is an in-memory stand-in for the storefront REST API. It
//! records every call, can be told to fail, and can hold calls open so tests
//! observe in-flight state.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storefront::api::{ApiError, ApiFuture, CatalogApi, OrderApi};
use storefront::catalog::NewProduct;
use storefront::{
    CartLine, NewOrder, Order, OrderId, OrderStatus, Product, ProductId, ShippingAddress, UserId,
};
use tokio::sync::Notify;

/// Generous bound for a round trip against the fake backend
pub const TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

/// In-memory storefront server
#[derive(Default)]
pub struct FakeBackend {
    orders: Mutex<Vec<Order>>,
    products: Mutex<Vec<Product>>,
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<ApiError>>,
    gate: Mutex<Option<Arc<Notify>>>,
    next_id: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_orders(orders: Vec<Order>) -> Arc<Self> {
        let backend = Self::default();
        *backend.orders.lock().unwrap() = orders;
        Arc::new(backend)
    }

    pub fn with_products(products: Vec<Product>) -> Arc<Self> {
        let backend = Self::default();
        *backend.products.lock().unwrap() = products;
        Arc::new(backend)
    }

    /// Replace the server-side order list
    pub fn set_orders(&self, orders: Vec<Order>) {
        *self.orders.lock().unwrap() = orders;
    }

    /// Server-side order list
    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }

    /// Server-side product list
    pub fn products(&self) -> Vec<Product> {
        self.products.lock().unwrap().clone()
    }

    /// Fail every following call with `error`
    pub fn fail_with(&self, error: ApiError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Stop failing
    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Hold every following call until the returned gate is notified
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Names of the calls received so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn enter(&self, call: &str) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call.to_string());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Server {
        status: 404,
        message: format!("{what} not found"),
    }
}

impl OrderApi for FakeBackend {
    fn place_order(&self, order: NewOrder) -> ApiFuture<'_, Order> {
        Box::pin(async move {
            self.enter("place_order").await?;
            let placed = Order {
                id: OrderId::new(self.next_id("order")),
                user: Some(UserId::new("u1")),
                order_items: order.order_items,
                shipping_address: order.shipping_address,
                payment_details: Some(order.payment_details),
                payment_method: Some(order.payment_method),
                total_price: order.total_price,
                order_status: OrderStatus::Pending,
                created_at: Utc::now(),
                confirmed_at: None,
                shipped_at: None,
                delivered_at: None,
                cancelled_at: None,
            };
            self.orders.lock().unwrap().push(placed.clone());
            Ok(placed)
        })
    }

    fn fetch_user_orders(&self) -> ApiFuture<'_, Vec<Order>> {
        Box::pin(async move {
            self.enter("fetch_user_orders").await?;
            Ok(self.orders())
        })
    }

    fn fetch_all_orders(&self) -> ApiFuture<'_, Vec<Order>> {
        Box::pin(async move {
            self.enter("fetch_all_orders").await?;
            Ok(self.orders())
        })
    }

    fn fetch_order(&self, order_id: OrderId) -> ApiFuture<'_, Order> {
        Box::pin(async move {
            self.enter("fetch_order").await?;
            self.orders
                .lock()
                .unwrap()
                .iter()
                .find(|o| o.id == order_id)
                .cloned()
                .ok_or_else(|| not_found("Order"))
        })
    }

    fn cancel_order(&self, order_id: OrderId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.enter("cancel_order").await?;
            let mut orders = self.orders.lock().unwrap();
            let order = orders
                .iter_mut()
                .find(|o| o.id == order_id)
                .ok_or_else(|| not_found("Order"))?;
            order.order_status = OrderStatus::Cancelled;
            order.cancelled_at = Some(Utc::now());
            Ok(())
        })
    }

    fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> ApiFuture<'_, Order> {
        Box::pin(async move {
            self.enter("update_order_status").await?;
            let mut orders = self.orders.lock().unwrap();
            let order = orders
                .iter_mut()
                .find(|o| o.id == order_id)
                .ok_or_else(|| not_found("Order"))?;
            order.order_status = status;
            Ok(order.clone())
        })
    }

    fn delete_order(&self, order_id: OrderId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.enter("delete_order").await?;
            self.orders.lock().unwrap().retain(|o| o.id != order_id);
            Ok(())
        })
    }
}

impl CatalogApi for FakeBackend {
    fn fetch_products(&self) -> ApiFuture<'_, Vec<Product>> {
        Box::pin(async move {
            self.enter("fetch_products").await?;
            Ok(self.products())
        })
    }

    fn fetch_products_by_brand(&self, brand: String) -> ApiFuture<'_, Vec<Product>> {
        Box::pin(async move {
            self.enter("fetch_products_by_brand").await?;
            Ok(self
                .products()
                .into_iter()
                .filter(|p| p.brand.eq_ignore_ascii_case(&brand))
                .collect())
        })
    }

    fn fetch_products_by_category(&self, category: String) -> ApiFuture<'_, Vec<Product>> {
        Box::pin(async move {
            self.enter("fetch_products_by_category").await?;
            Ok(self
                .products()
                .into_iter()
                .filter(|p| p.category == category)
                .collect())
        })
    }

    fn fetch_featured_products(&self) -> ApiFuture<'_, Vec<Product>> {
        Box::pin(async move {
            self.enter("fetch_featured_products").await?;
            Ok(self.products().into_iter().take(2).collect())
        })
    }

    fn fetch_product(&self, product_id: ProductId) -> ApiFuture<'_, Product> {
        Box::pin(async move {
            self.enter("fetch_product").await?;
            self.products()
                .into_iter()
                .find(|p| p.id == product_id)
                .ok_or_else(|| not_found("Product"))
        })
    }

    fn add_product(&self, product: NewProduct) -> ApiFuture<'_, Product> {
        Box::pin(async move {
            self.enter("add_product").await?;
            let created = Product {
                id: ProductId::new(self.next_id("product")),
                name: product.name,
                description: product.description,
                price: product.price,
                image_url: product.image_url,
                brand: product.brand,
                category: product.category,
                sizes: product.sizes,
            };
            self.products.lock().unwrap().push(created.clone());
            Ok(created)
        })
    }

    fn update_product(&self, product: Product) -> ApiFuture<'_, Product> {
        Box::pin(async move {
            self.enter("update_product").await?;
            let mut products = self.products.lock().unwrap();
            let slot = products
                .iter_mut()
                .find(|p| p.id == product.id)
                .ok_or_else(|| not_found("Product"))?;
            *slot = product.clone();
            Ok(product)
        })
    }

    fn restock_product(
        &self,
        product_id: ProductId,
        sizes: BTreeMap<String, u32>,
    ) -> ApiFuture<'_, Product> {
        Box::pin(async move {
            self.enter("restock_product").await?;
            let mut products = self.products.lock().unwrap();
            let product = products
                .iter_mut()
                .find(|p| p.id == product_id)
                .ok_or_else(|| not_found("Product"))?;
            product.sizes.extend(sizes);
            Ok(product.clone())
        })
    }

    fn delete_product(&self, product_id: ProductId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.enter("delete_product").await?;
            self.products.lock().unwrap().retain(|p| p.id != product_id);
            Ok(())
        })
    }
}

/// Server-side order with one line of `P1`
pub fn order(id: &str, status: OrderStatus) -> Order {
    Order {
        id: OrderId::new(id),
        user: Some(UserId::new("u1")),
        order_items: Vec::new(),
        shipping_address: address(),
        payment_details: None,
        payment_method: Some("Credit Card".into()),
        total_price: Decimal::from(100),
        order_status: status,
        created_at: Utc::now(),
        confirmed_at: None,
        shipped_at: None,
        delivered_at: None,
        cancelled_at: None,
    }
}

/// Catalog product with the given stock per size
pub fn product(id: &str, brand: &str, category: &str, stock: &[(&str, u32)]) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Sneaker {id}"),
        description: String::new(),
        price: Decimal::from(100),
        image_url: format!("{id}.png"),
        brand: brand.into(),
        category: category.into(),
        sizes: stock.iter().map(|(s, n)| ((*s).to_string(), *n)).collect(),
    }
}

/// Valid cart line
pub fn line(product_id: &str, size: &str, quantity: u32, price: u32) -> CartLine {
    CartLine::new(
        product_id,
        size,
        quantity,
        Decimal::from(price),
        format!("Sneaker {product_id}"),
        format!("{product_id}.png"),
    )
    .unwrap()
}

/// Complete shipping address
pub fn address() -> ShippingAddress {
    ShippingAddress {
        address: "1 Main Street".into(),
        city: "Oslo".into(),
        postal_code: "0150".into(),
        country: "Norway".into(),
    }
}
