//! Identifier and money types shared across the storefront containers.
//!
//! Every identifier is assigned by the remote API; the client only ever
//! copies them around, so they are thin string newtypes.

use serde::{Deserialize, Serialize};

/// Monetary amount (unit prices, totals). Serialised as a JSON number.
pub type Money = rust_decimal::Decimal;

/// Σ quantity × price over `(price, quantity)` pairs.
///
/// `None` when a product or the running sum does not fit in [`Money`].
pub fn checked_total(items: impl IntoIterator<Item = (Money, u32)>) -> Option<Money> {
    items.into_iter().try_fold(Money::ZERO, |total, (price, quantity)| {
        price.checked_mul(Money::from(quantity))?.checked_add(total)
    })
}

macro_rules! server_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a server-assigned identifier
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

server_id!(
    /// Product identifier (`_id` of a catalog product)
    ProductId
);

server_id!(
    /// Order identifier, always assigned by the server
    OrderId
);

server_id!(
    /// User identifier
    UserId
);
