//! Checkout: turn the cart into an order.

use crate::cart::CartStore;
use crate::order::{NewOrder, Order, PaymentDetails, ShippingAddress};
use crate::workflow::{OrderWorkflow, WorkflowError};
use thiserror::Error;

/// Why checkout did not produce an order
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("Your cart is empty")]
    EmptyCart,

    /// Every shipping field is required.
    #[error("Please fill in the complete shipping address")]
    IncompleteAddress,

    /// Placing the order failed; the cart is unchanged.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// Place an order for everything in the cart.
///
/// The cart is cleared only after the server accepted the order. If the
/// cleared cart cannot be persisted the order still counts as placed; the
/// storage failure is logged.
///
/// # Errors
///
/// - [`CheckoutError::EmptyCart`] / [`CheckoutError::IncompleteAddress`]
///   before any network call
/// - [`CheckoutError::Workflow`] when the order is refused. With a response
///   timeout configured, a `Timeout` leaves the outcome unknown: the order
///   may still be placed, so check "my orders" before retrying.
#[tracing::instrument(skip_all, fields(lines = cart.len()))]
pub async fn checkout(
    cart: &mut CartStore,
    orders: &OrderWorkflow,
    shipping_address: ShippingAddress,
) -> Result<Order, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    if !shipping_address.is_complete() {
        return Err(CheckoutError::IncompleteAddress);
    }

    let request = NewOrder::from_cart(cart.lines(), shipping_address, PaymentDetails::placeholder());
    let order = orders.place_order(request).await?;

    if let Err(error) = cart.clear() {
        tracing::warn!(%error, order_id = %order.id, "Order placed but the emptied cart was not saved");
    }

    Ok(order)
}
