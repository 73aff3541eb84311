//! # Storefront
//!
//! Client-side state for a sneaker storefront backed by a REST API.
//!
//! - [`cart`]: synchronous line-item ledger persisted to local storage
//! - [`orders`] / [`workflow`]: order mirror kept in step with the server
//! - [`catalog`]: product browsing and admin stock management
//! - [`account`]: registration, sign-in and the stored session
//! - [`checkout`]: cart → order
//!
//! Containers are built from explicit dependencies; nothing is global.
//!
//! ```ignore
//! let storage: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::open(".storefront")?);
//! let api = Arc::new(HttpStorefrontApi::new(config.api_url, Arc::clone(&storage)));
//!
//! let mut cart = CartStore::hydrate(Arc::clone(&storage));
//! let orders = OrderWorkflow::new(api, config.response_timeout);
//!
//! let order = checkout(&mut cart, &orders, address).await?;
//! ```

pub mod account;
pub mod api;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod notice;
pub mod order;
pub mod orders;
pub mod storage;
pub mod types;
pub mod workflow;

pub use account::{AuthError, AuthService, SessionStore, SessionUser};
pub use api::{AccountApi, ApiError, CatalogApi, HttpStorefrontApi, OrderApi};
pub use cart::{CartError, CartIntent, CartLine, CartState, CartStore};
pub use catalog::{Catalog, Product};
pub use checkout::{CheckoutError, checkout};
pub use config::Config;
pub use notice::{Notice, NoticeKind};
pub use order::{NewOrder, Order, OrderStatus, PaymentDetails, ShippingAddress};
pub use orders::{OrderAction, OrderError, OrderState, RequestId};
pub use storage::FileStorage;
pub use types::{Money, OrderId, ProductId, UserId};
pub use workflow::{OrderWorkflow, RefreshScope, WorkflowError};
