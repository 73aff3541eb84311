//! Cart Store: client-local, synchronous line-item ledger.
//!
//! [`CartReducer`] holds the ledger rules; [`CartStore`] runs it inline,
//! publishes every new ledger to subscribers and writes the full ledger to
//! persistent storage under the `cartItems` key after every dispatch.

use crate::storage::keys;
use crate::types::{Money, ProductId, checked_total};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use storefront_core::effect::Effect;
use storefront_core::environment::{KeyValueStorage, StorageError};
use storefront_core::reducer::Reducer;
use storefront_core::{SmallVec, smallvec};
use thiserror::Error;
use tokio::sync::watch;

/// Client-side validation failures raised before anything reaches the cart
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// No size was chosen for the product.
    #[error("Please select a size")]
    NoSizeSelected,

    /// A line must hold at least one unit.
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// The chosen size is not offered for the product.
    #[error("Size {size} is not available for this product")]
    UnknownSize {
        /// Requested size
        size: String,
    },
}

/// One (product, size) pairing with a quantity
///
/// Serialised with the storefront's wire names: `_id`, `size`, `quantity`,
/// `price`, `name`, `imageUrl`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product id
    #[serde(rename = "_id", alias = "productId")]
    pub product_id: ProductId,
    /// Selected size
    pub size: String,
    /// Units in the cart, never 0 inside a ledger
    pub quantity: u32,
    /// Unit price
    pub price: Money,
    /// Display name
    pub name: String,
    /// Display image
    #[serde(rename = "imageUrl", default)]
    pub image_url: String,
}

impl CartLine {
    /// Build a validated line.
    ///
    /// # Errors
    ///
    /// - [`CartError::NoSizeSelected`] when `size` is blank
    /// - [`CartError::InvalidQuantity`] when `quantity` is 0
    pub fn new(
        product_id: impl Into<ProductId>,
        size: impl Into<String>,
        quantity: u32,
        price: Money,
        name: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Result<Self, CartError> {
        let size = size.into();
        if size.trim().is_empty() {
            return Err(CartError::NoSizeSelected);
        }
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        Ok(Self {
            product_id: product_id.into(),
            size,
            quantity,
            price,
            name: name.into(),
            image_url: image_url.into(),
        })
    }

    /// Whether this line has the `(product_id, size)` key
    #[must_use]
    pub fn matches(&self, product_id: &ProductId, size: &str) -> bool {
        &self.product_id == product_id && self.size == size
    }

    /// `quantity × price`, saturating at [`Money::MAX`]
    ///
    /// Lines held by a [`CartState`] never saturate.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.price
            .checked_mul(Money::from(self.quantity))
            .unwrap_or(Money::MAX)
    }
}

/// Ordered ledger of cart lines (insertion order is display order)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CartState {
    lines: Vec<CartLine>,
}

impl CartState {
    /// Lines in insertion order
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Σ quantity × price, recomputed on every call
    ///
    /// A ledger only ever holds lines whose total fits in [`Money`]; the
    /// saturation at [`Money::MAX`] is never reached through the reducer or
    /// [`CartState::from_json`].
    #[must_use]
    pub fn total(&self) -> Money {
        Self::checked_total_of(&self.lines).unwrap_or(Money::MAX)
    }

    fn checked_total_of(lines: &[CartLine]) -> Option<Money> {
        checked_total(lines.iter().map(|line| (line.price, line.quantity)))
    }

    /// Number of distinct lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the ledger is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Σ quantity
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Line with the given key
    #[must_use]
    pub fn find(&self, product_id: &ProductId, size: &str) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.matches(product_id, size))
    }

    /// Serialise the ledger as a JSON array
    ///
    /// # Errors
    ///
    /// Returns the serializer error (only possible for non-finite prices).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.lines)
    }

    /// Parse a persisted ledger.
    ///
    /// Returns `None` when the text is not a JSON array of lines, or when it
    /// parses but breaks a ledger invariant: a zero quantity, a repeated
    /// `(product, size)` key, or a total too large for [`Money`].
    #[must_use]
    pub fn from_json(json: &str) -> Option<Self> {
        let lines: Vec<CartLine> = serde_json::from_str(json).ok()?;

        let mut seen = HashSet::with_capacity(lines.len());
        for line in &lines {
            if line.quantity == 0 || !seen.insert((&line.product_id, line.size.as_str())) {
                return None;
            }
        }
        Self::checked_total_of(&lines)?;

        Some(Self { lines })
    }
}

/// Cart intents
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CartIntent {
    /// Append the line, or grow the quantity of the line with the same key
    AddToCart(CartLine),
    /// Take one unit off; a line at quantity 1 is removed
    DecreaseQuantity {
        /// Product id
        product_id: ProductId,
        /// Size
        size: String,
    },
    /// Delete the line with this key
    RemoveFromCart {
        /// Product id
        product_id: ProductId,
        /// Size
        size: String,
    },
    /// Empty the ledger
    ClearCart,
}

/// Ledger rules for the cart
#[derive(Clone, Copy, Debug, Default)]
pub struct CartReducer;

impl CartReducer {
    /// Creates the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for CartReducer {
    type State = CartState;
    type Action = CartIntent;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut CartState,
        action: CartIntent,
        _env: &(),
    ) -> SmallVec<[Effect<CartIntent>; 4]> {
        match action {
            CartIntent::AddToCart(line) => {
                if line.quantity == 0 {
                    return smallvec![Effect::None];
                }
                let mut lines = state.lines.clone();
                if let Some(existing) = lines
                    .iter_mut()
                    .find(|existing| existing.matches(&line.product_id, &line.size))
                {
                    let Some(quantity) = existing.quantity.checked_add(line.quantity) else {
                        tracing::warn!(product_id = %line.product_id, size = %line.size, "Refusing add: quantity overflows");
                        return smallvec![Effect::None];
                    };
                    existing.quantity = quantity;
                } else {
                    lines.push(line);
                }
                if CartState::checked_total_of(&lines).is_none() {
                    tracing::warn!("Refusing add: cart total overflows");
                    return smallvec![Effect::None];
                }
                state.lines = lines;
            },
            CartIntent::DecreaseQuantity { product_id, size } => {
                if let Some(index) = state
                    .lines
                    .iter()
                    .position(|line| line.matches(&product_id, &size))
                {
                    if state.lines[index].quantity > 1 {
                        state.lines[index].quantity -= 1;
                    } else {
                        state.lines.remove(index);
                    }
                }
            },
            CartIntent::RemoveFromCart { product_id, size } => {
                state.lines.retain(|line| !line.matches(&product_id, &size));
            },
            CartIntent::ClearCart => state.lines.clear(),
        }

        smallvec![Effect::None]
    }
}

/// Synchronous cart container with persistence and change notification
///
/// # Example
///
/// ```ignore
/// let mut cart = CartStore::hydrate(storage);
/// cart.add(CartLine::new("P1", "42", 1, Decimal::from(100), "Runner", "")?)?;
/// assert_eq!(cart.total(), Decimal::from(100));
/// ```
pub struct CartStore {
    state: CartState,
    reducer: CartReducer,
    storage: Arc<dyn KeyValueStorage>,
    updates: watch::Sender<CartState>,
}

impl CartStore {
    /// Load the ledger from storage.
    ///
    /// Never fails: a missing key, an unreadable backend or a corrupt value
    /// all start an empty ledger.
    #[must_use]
    pub fn hydrate(storage: Arc<dyn KeyValueStorage>) -> Self {
        let state = match storage.get(keys::CART_ITEMS) {
            Ok(Some(json)) => CartState::from_json(&json).unwrap_or_else(|| {
                tracing::warn!(key = keys::CART_ITEMS, "Discarding corrupt persisted cart");
                CartState::default()
            }),
            Ok(None) => CartState::default(),
            Err(error) => {
                tracing::warn!(%error, "Cart storage unreadable, starting empty");
                CartState::default()
            },
        };

        tracing::debug!(lines = state.len(), "Cart hydrated");
        let (updates, _) = watch::channel(state.clone());

        Self {
            state,
            reducer: CartReducer::new(),
            storage,
            updates,
        }
    }

    /// Apply an intent, notify subscribers and persist the new ledger.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the ledger could not be written. The
    /// in-memory change has already been applied and published.
    #[tracing::instrument(skip(self), name = "cart_dispatch")]
    pub fn dispatch(&mut self, intent: CartIntent) -> Result<(), StorageError> {
        let _ = self.reducer.reduce(&mut self.state, intent, &());
        self.updates.send_replace(self.state.clone());
        self.persist()
    }

    /// Add a line (see [`CartIntent::AddToCart`])
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when persisting fails.
    pub fn add(&mut self, line: CartLine) -> Result<(), StorageError> {
        self.dispatch(CartIntent::AddToCart(line))
    }

    /// Take one unit off a line (see [`CartIntent::DecreaseQuantity`])
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when persisting fails.
    pub fn decrease(&mut self, product_id: &ProductId, size: &str) -> Result<(), StorageError> {
        self.dispatch(CartIntent::DecreaseQuantity {
            product_id: product_id.clone(),
            size: size.to_string(),
        })
    }

    /// Remove a line (see [`CartIntent::RemoveFromCart`])
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when persisting fails.
    pub fn remove(&mut self, product_id: &ProductId, size: &str) -> Result<(), StorageError> {
        self.dispatch(CartIntent::RemoveFromCart {
            product_id: product_id.clone(),
            size: size.to_string(),
        })
    }

    /// Empty the cart
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when persisting fails.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.dispatch(CartIntent::ClearCart)
    }

    /// Current ledger
    #[must_use]
    pub const fn state(&self) -> &CartState {
        &self.state
    }

    /// Lines in insertion order
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        self.state.lines()
    }

    /// Σ quantity × price
    #[must_use]
    pub fn total(&self) -> Money {
        self.state.total()
    }

    /// Number of distinct lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.len()
    }

    /// Whether the cart is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Σ quantity
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.state.item_count()
    }

    /// Receive every ledger published after a dispatch
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.updates.subscribe()
    }

    fn persist(&self) -> Result<(), StorageError> {
        let json = self
            .state
            .to_json()
            .map_err(|e| StorageError::Serialization {
                key: keys::CART_ITEMS.to_string(),
                message: e.to_string(),
            })?;

        self.storage.set(keys::CART_ITEMS, &json).inspect_err(|error| {
            tracing::warn!(%error, "Failed to persist cart");
        })
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
