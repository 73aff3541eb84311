//! Order records and the status transition table.
//!
//! Orders are owned by the server. The client builds [`NewOrder`] requests
//! from the cart and mirrors the [`Order`] records the server returns.

use crate::cart::CartLine;
use crate::types::{Money, OrderId, ProductId, UserId, checked_total};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle status of an order
///
/// Forward transitions are admin-driven:
///
/// | From      | Allowed next statuses            |
/// |-----------|----------------------------------|
/// | Pending   | Confirmed, Shipped, Delivered    |
/// | Confirmed | Shipped, Delivered               |
/// | Shipped   | Delivered                        |
/// | Delivered | (terminal)                       |
/// | Cancelled | (terminal)                       |
///
/// Cancellation is a separate side transition that customers may request
/// only while the order is Pending or Confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Placed, awaiting confirmation
    Pending,
    /// Accepted by the shop
    Confirmed,
    /// Handed to the carrier
    Shipped,
    /// Received by the customer
    Delivered,
    /// Cancelled before shipping
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Statuses an admin may move an order to from `self`
    #[must_use]
    pub const fn next_statuses(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Shipped, Self::Delivered],
            Self::Confirmed => &[Self::Shipped, Self::Delivered],
            Self::Shipped => &[Self::Delivered],
            Self::Delivered | Self::Cancelled => &[],
        }
    }

    /// Whether `next` is in the allowed-transition table for `self`
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.next_statuses().contains(&next)
    }

    /// Delivered and Cancelled accept no further transitions
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Customers may cancel only Pending or Confirmed orders.
    ///
    /// This is narrower than what the server accepts; the client gate is
    /// kept as is.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Wire name of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Error returned when parsing an unknown status name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown order status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// One line of an order, copied from the cart at checkout
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Product id (`product` on the wire)
    #[serde(alias = "productId")]
    pub product: ProductId,
    /// Selected size
    pub size: String,
    /// Units ordered
    pub quantity: u32,
    /// Unit price at checkout time
    pub price: Money,
    /// Product name at checkout time
    pub name: String,
    /// Product image
    #[serde(default)]
    pub image_url: String,
}

impl From<&CartLine> for OrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product: line.product_id.clone(),
            size: line.size.clone(),
            quantity: line.quantity,
            price: line.price,
            name: line.name.clone(),
            image_url: line.image_url.clone(),
        }
    }
}

/// Delivery address entered at checkout
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    /// Street address
    pub address: String,
    /// City
    pub city: String,
    /// Postal code
    pub postal_code: String,
    /// Country
    pub country: String,
}

impl ShippingAddress {
    /// Whether every field holds non-blank text
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [&self.address, &self.city, &self.postal_code, &self.country]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

/// Payment reference attached to an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// Transaction reference
    pub transaction_id: String,
    /// Payment method label
    pub method: String,
}

impl PaymentDetails {
    /// Payment method label used for every checkout
    pub const CREDIT_CARD: &'static str = "Credit Card";

    /// Locally generated, non-authoritative payment reference.
    ///
    /// There is no payment integration; the id only marks the order as a test
    /// order (`TEST_<n>` with `n` in `0..1_000_000`).
    #[must_use]
    pub fn placeholder() -> Self {
        let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
        Self {
            transaction_id: format!("TEST_{n}"),
            method: Self::CREDIT_CARD.to_string(),
        }
    }
}

/// Order creation request (`POST /orders` body)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    /// Lines being ordered
    pub order_items: Vec<OrderItem>,
    /// Delivery address
    pub shipping_address: ShippingAddress,
    /// Payment reference
    pub payment_details: PaymentDetails,
    /// Payment method label
    pub payment_method: String,
    /// Σ quantity × price over `order_items`
    pub total_price: Money,
}

impl NewOrder {
    /// Build an order request from cart lines
    ///
    /// Lines taken from a cart ledger always have a representable total;
    /// any other set that overflows is capped at [`Money::MAX`].
    #[must_use]
    pub fn from_cart(
        lines: &[CartLine],
        shipping_address: ShippingAddress,
        payment_details: PaymentDetails,
    ) -> Self {
        let order_items: Vec<OrderItem> = lines.iter().map(OrderItem::from).collect();
        let total_price = checked_total(order_items.iter().map(|item| (item.price, item.quantity)))
            .unwrap_or_else(|| {
                tracing::warn!(items = order_items.len(), "Order total overflows, capping");
                Money::MAX
            });

        Self {
            order_items,
            shipping_address,
            payment_method: payment_details.method.clone(),
            payment_details,
            total_price,
        }
    }
}

/// Server-owned order record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Server-assigned id
    #[serde(rename = "_id")]
    pub id: OrderId,
    /// Owner of the order
    #[serde(default, alias = "userId")]
    pub user: Option<UserId>,
    /// Ordered lines
    pub order_items: Vec<OrderItem>,
    /// Delivery address
    pub shipping_address: ShippingAddress,
    /// Payment reference
    #[serde(default)]
    pub payment_details: Option<PaymentDetails>,
    /// Payment method label
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Order total as computed at checkout
    pub total_price: Money,
    /// Current status
    pub order_status: OrderStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// When the order was confirmed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When the order was shipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<DateTime<Utc>>,
    /// When the order was delivered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    /// When the order was cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether a customer may cancel this order
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        self.order_status.is_cancellable()
    }

    /// Statuses an admin may move this order to
    #[must_use]
    pub const fn next_statuses(&self) -> &'static [OrderStatus] {
        self.order_status.next_statuses()
    }
}
