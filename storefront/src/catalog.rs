//! Product catalog: browsing for customers, stock management for admins.
//!
//! Unlike orders, catalog failures are not returned to the caller. They are
//! recorded in [`CatalogState::error`] as the server message, or a fixed
//! fallback, for the view to display.

use crate::api::{ApiError, ApiFuture, CatalogApi};
use crate::cart::{CartError, CartLine};
use crate::types::{Money, ProductId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::effect::Effect;
use storefront_core::reducer::Reducer;
use storefront_core::{SmallVec, smallvec};
use storefront_runtime::{Store, StoreError};

/// Message recorded when the server gives no reason
pub const GENERIC_FAILURE: &str = "Something went wrong";

/// Message recorded when a restock fails without a reason
pub const RESTOCK_FAILURE: &str = "Failed to restock product";

/// Catalog product
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Server-assigned id
    #[serde(rename = "_id")]
    pub id: ProductId,
    /// Display name
    pub name: String,
    /// Long description
    #[serde(default)]
    pub description: String,
    /// Unit price
    pub price: Money,
    /// Display image
    #[serde(default)]
    pub image_url: String,
    /// Brand, used for brand pages
    #[serde(default)]
    pub brand: String,
    /// Category (`men`, `women`, …)
    #[serde(default)]
    pub category: String,
    /// Stock per size
    #[serde(default)]
    pub sizes: BTreeMap<String, u32>,
}

impl Product {
    /// One unit of this product in `size`, ready for the cart.
    ///
    /// # Errors
    ///
    /// - [`CartError::NoSizeSelected`] when `size` is blank
    /// - [`CartError::UnknownSize`] when the product lists sizes and `size`
    ///   is not one of them
    pub fn to_cart_line(&self, size: &str) -> Result<CartLine, CartError> {
        if !size.trim().is_empty() && !self.sizes.is_empty() && !self.sizes.contains_key(size) {
            return Err(CartError::UnknownSize {
                size: size.to_string(),
            });
        }

        CartLine::new(
            self.id.clone(),
            size,
            1,
            self.price,
            self.name.clone(),
            self.image_url.clone(),
        )
    }
}

/// Product creation request (`POST /products` body)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    /// Display name
    pub name: String,
    /// Long description
    pub description: String,
    /// Unit price
    pub price: Money,
    /// Display image
    pub image_url: String,
    /// Brand
    pub brand: String,
    /// Category
    pub category: String,
    /// Initial stock per size
    pub sizes: BTreeMap<String, u32>,
}

/// Catalog view state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogState {
    /// Last loaded product list
    pub products: Vec<Product>,
    /// Product shown in the detail view
    pub product: Option<Product>,
    /// Round trips currently awaiting a result
    pub in_flight: usize,
    /// Message of the last failure, cleared when a new request starts
    pub error: Option<String>,
}

impl CatalogState {
    /// Whether any round trip is outstanding
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    fn begin_request(&mut self) {
        self.in_flight += 1;
        self.error = None;
    }

    fn finish_request(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    fn replace_product(&mut self, product: Product) {
        if let Some(slot) = self.products.iter_mut().find(|p| p.id == product.id) {
            *slot = product.clone();
        }
        if self.product.as_ref().is_some_and(|p| p.id == product.id) {
            self.product = Some(product);
        }
    }
}

/// Catalog intents and their results
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogAction {
    // Commands
    /// Load every product
    FetchProducts,
    /// Load one brand's products
    FetchProductsByBrand(String),
    /// Load one category's products
    FetchProductsByCategory(String),
    /// Load the featured products
    FetchFeaturedProducts,
    /// Load one product into the detail view
    FetchProduct(ProductId),
    /// Create a product (admin)
    AddProduct(NewProduct),
    /// Replace a product (admin)
    UpdateProduct(Product),
    /// Set per-size stock (admin)
    RestockProduct {
        /// Product to restock
        product_id: ProductId,
        /// New stock per size
        sizes: BTreeMap<String, u32>,
    },
    /// Delete a product (admin)
    DeleteProduct(ProductId),

    // Results
    /// A product list arrived
    ProductsLoaded(Vec<Product>),
    /// A single product arrived
    ProductLoaded(Product),
    /// The server created a product
    ProductAdded(Product),
    /// The server stored an update or restock
    ProductUpdated(Product),
    /// The server deleted a product
    ProductDeleted(ProductId),
    /// A round trip failed
    Failed {
        /// Message to display
        message: String,
    },
}

/// Dependencies of the catalog reducer
#[derive(Clone)]
pub struct CatalogEnvironment {
    /// Remote product endpoints
    pub api: Arc<dyn CatalogApi>,
}

/// Reducer for the catalog view
#[derive(Clone, Copy, Debug, Default)]
pub struct CatalogReducer;

fn fetch<T, Call, Done>(
    env: &CatalogEnvironment,
    fallback: &'static str,
    call: Call,
    done: Done,
) -> Effect<CatalogAction>
where
    T: Send + 'static,
    Call: for<'a> FnOnce(&'a dyn CatalogApi) -> ApiFuture<'a, T> + Send + 'static,
    Done: FnOnce(T) -> CatalogAction + Send + 'static,
{
    let api = Arc::clone(&env.api);
    Effect::future(async move {
        Some(match call(&*api).await {
            Ok(value) => done(value),
            Err(error) => failure(&error, fallback),
        })
    })
}

fn failure(error: &ApiError, fallback: &str) -> CatalogAction {
    tracing::warn!(%error, "Catalog request failed");
    CatalogAction::Failed {
        message: error.message_or(fallback),
    }
}

impl Reducer for CatalogReducer {
    type State = CatalogState;
    type Action = CatalogAction;
    type Environment = CatalogEnvironment;

    fn reduce(
        &self,
        state: &mut CatalogState,
        action: CatalogAction,
        env: &CatalogEnvironment,
    ) -> SmallVec<[Effect<CatalogAction>; 4]> {
        let effect = match action {
            CatalogAction::FetchProducts => fetch(
                env,
                GENERIC_FAILURE,
                |api| api.fetch_products(),
                CatalogAction::ProductsLoaded,
            ),
            CatalogAction::FetchProductsByBrand(brand) => fetch(
                env,
                GENERIC_FAILURE,
                move |api| api.fetch_products_by_brand(brand),
                CatalogAction::ProductsLoaded,
            ),
            CatalogAction::FetchProductsByCategory(category) => fetch(
                env,
                GENERIC_FAILURE,
                move |api| api.fetch_products_by_category(category),
                CatalogAction::ProductsLoaded,
            ),
            CatalogAction::FetchFeaturedProducts => fetch(
                env,
                GENERIC_FAILURE,
                |api| api.fetch_featured_products(),
                CatalogAction::ProductsLoaded,
            ),
            CatalogAction::FetchProduct(product_id) => fetch(
                env,
                GENERIC_FAILURE,
                move |api| api.fetch_product(product_id),
                CatalogAction::ProductLoaded,
            ),
            CatalogAction::AddProduct(product) => fetch(
                env,
                GENERIC_FAILURE,
                move |api| api.add_product(product),
                CatalogAction::ProductAdded,
            ),
            CatalogAction::UpdateProduct(product) => fetch(
                env,
                GENERIC_FAILURE,
                move |api| api.update_product(product),
                CatalogAction::ProductUpdated,
            ),
            CatalogAction::RestockProduct { product_id, sizes } => fetch(
                env,
                RESTOCK_FAILURE,
                move |api| api.restock_product(product_id, sizes),
                CatalogAction::ProductUpdated,
            ),
            CatalogAction::DeleteProduct(product_id) => {
                let deleted = product_id.clone();
                fetch(
                    env,
                    GENERIC_FAILURE,
                    move |api| api.delete_product(product_id),
                    move |()| CatalogAction::ProductDeleted(deleted),
                )
            },

            CatalogAction::ProductsLoaded(products) => {
                state.finish_request();
                state.products = products;
                return smallvec![Effect::None];
            },
            CatalogAction::ProductLoaded(product) => {
                state.finish_request();
                state.product = Some(product);
                return smallvec![Effect::None];
            },
            CatalogAction::ProductAdded(product) => {
                state.finish_request();
                state.products.push(product);
                return smallvec![Effect::None];
            },
            CatalogAction::ProductUpdated(product) => {
                state.finish_request();
                state.replace_product(product);
                return smallvec![Effect::None];
            },
            CatalogAction::ProductDeleted(product_id) => {
                state.finish_request();
                state.products.retain(|p| p.id != product_id);
                if state.product.as_ref().is_some_and(|p| p.id == product_id) {
                    state.product = None;
                }
                return smallvec![Effect::None];
            },
            CatalogAction::Failed { message } => {
                state.finish_request();
                state.error = Some(message);
                return smallvec![Effect::None];
            },
        };

        state.begin_request();
        smallvec![effect]
    }
}

/// Store running the catalog reducer
pub type CatalogStore = Store<CatalogState, CatalogAction, CatalogEnvironment, CatalogReducer>;

/// Async facade over the catalog store.
///
/// Each call sends one command and waits for its round trip to settle.
/// Outcomes are read back through the accessors, including
/// [`Catalog::error`].
#[derive(Clone)]
pub struct Catalog {
    store: CatalogStore,
    response_timeout: Option<Duration>,
}

impl Catalog {
    /// Empty catalog backed by `api`
    ///
    /// `response_timeout` of `None` waits for every outcome.
    #[must_use]
    pub fn new(api: Arc<dyn CatalogApi>, response_timeout: Option<Duration>) -> Self {
        Self {
            store: Store::new(
                CatalogState::default(),
                CatalogReducer,
                CatalogEnvironment { api },
            ),
            response_timeout,
        }
    }

    async fn run(&self, action: CatalogAction) -> Result<(), StoreError> {
        let mut handle = self.store.send(action).await?;
        match self.response_timeout {
            Some(timeout) => handle.wait_with_timeout(timeout).await,
            None => {
                handle.wait().await;
                Ok(())
            },
        }
    }

    /// Stop accepting commands and wait for outstanding round trips
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if round trips are still
    /// running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        self.store.shutdown(timeout).await
    }

    /// Load every product
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shut down or the call times out.
    pub async fn fetch_products(&self) -> Result<(), StoreError> {
        self.run(CatalogAction::FetchProducts).await
    }

    /// Load one brand's products
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shut down or the call times out.
    pub async fn fetch_products_by_brand(&self, brand: &str) -> Result<(), StoreError> {
        self.run(CatalogAction::FetchProductsByBrand(brand.to_string())).await
    }

    /// Load one category's products
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shut down or the call times out.
    pub async fn fetch_products_by_category(&self, category: &str) -> Result<(), StoreError> {
        self.run(CatalogAction::FetchProductsByCategory(category.to_string()))
            .await
    }

    /// Load the featured products
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shut down or the call times out.
    pub async fn fetch_featured_products(&self) -> Result<(), StoreError> {
        self.run(CatalogAction::FetchFeaturedProducts).await
    }

    /// Load one product into the detail view
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shut down or the call times out.
    pub async fn fetch_product(&self, product_id: ProductId) -> Result<(), StoreError> {
        self.run(CatalogAction::FetchProduct(product_id)).await
    }

    /// Create a product (admin)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shut down or the call times out.
    pub async fn add_product(&self, product: NewProduct) -> Result<(), StoreError> {
        self.run(CatalogAction::AddProduct(product)).await
    }

    /// Replace a product (admin)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shut down or the call times out.
    pub async fn update_product(&self, product: Product) -> Result<(), StoreError> {
        self.run(CatalogAction::UpdateProduct(product)).await
    }

    /// Set per-size stock (admin)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shut down or the call times out.
    pub async fn restock_product(
        &self,
        product_id: ProductId,
        sizes: BTreeMap<String, u32>,
    ) -> Result<(), StoreError> {
        self.run(CatalogAction::RestockProduct { product_id, sizes }).await
    }

    /// Delete a product (admin)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store is shut down or the call times out.
    pub async fn delete_product(&self, product_id: ProductId) -> Result<(), StoreError> {
        self.run(CatalogAction::DeleteProduct(product_id)).await
    }

    /// Last loaded product list
    pub async fn products(&self) -> Vec<Product> {
        self.store.state(|s| s.products.clone()).await
    }

    /// Product in the detail view
    pub async fn product(&self) -> Option<Product> {
        self.store.state(|s| s.product.clone()).await
    }

    /// Message of the last failure
    pub async fn error(&self) -> Option<String> {
        self.store.state(|s| s.error.clone()).await
    }

    /// Whether a round trip is outstanding
    pub async fn is_loading(&self) -> bool {
        self.store.state(CatalogState::is_loading).await
    }
}
