//! Order Workflow reducer.
//!
//! Commands carry a [`RequestId`]; the reducer validates them against the
//! local mirror, turns accepted ones into a single API round trip and folds
//! the result action back into the mirror. Results echo the request id so
//! concurrent callers each receive their own outcome.
//!
//! Mirror rules:
//! - `OrderPlaced` appends to "my orders"
//! - fetches replace their mirror wholesale (last write wins)
//! - `OrderStatusUpdated` replaces the record in "all orders" in place
//! - `OrderDeleted` removes the record from "all orders"
//! - `OrderCancelled` changes nothing; callers refresh to see the new status
//! - `ClearOrders` forgets outstanding requests; their results still reach
//!   the caller but no longer touch the mirror

use crate::api::{ApiError, ApiFuture, OrderApi};
use crate::order::{NewOrder, Order, OrderStatus};
use crate::types::OrderId;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use storefront_core::effect::Effect;
use storefront_core::reducer::Reducer;
use storefront_core::{SmallVec, smallvec};
use thiserror::Error;
use uuid::Uuid;

/// Correlates a command with its result action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Remote operation an [`OrderError::Api`] came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderOperation {
    /// `POST /orders`
    PlaceOrder,
    /// `GET /orders/my-orders`
    FetchUserOrders,
    /// `GET /orders`
    FetchAllOrders,
    /// `GET /orders/{id}`
    FetchOrder,
    /// `PUT /orders/{id}/cancel`
    CancelOrder,
    /// `PUT /orders/{id}`
    UpdateOrderStatus,
    /// `DELETE /orders/{id}`
    DeleteOrder,
}

impl fmt::Display for OrderOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PlaceOrder => "place order",
            Self::FetchUserOrders => "fetch user orders",
            Self::FetchAllOrders => "fetch all orders",
            Self::FetchOrder => "fetch order",
            Self::CancelOrder => "cancel order",
            Self::UpdateOrderStatus => "update order status",
            Self::DeleteOrder => "delete order",
        };
        f.write_str(name)
    }
}

/// Why an order command failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// An order must contain at least one item.
    #[error("Cannot place an order without items")]
    EmptyOrder,

    /// The order is not in any local mirror, so its status is unknown.
    #[error("Order {0} is not loaded")]
    UnknownOrder(OrderId),

    /// The target status is outside the transition table.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    TransitionNotAllowed {
        /// Order being updated
        order_id: OrderId,
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// Customers may only cancel Pending or Confirmed orders.
    #[error("Order {order_id} is {status} and can no longer be cancelled")]
    NotCancellable {
        /// Order being cancelled
        order_id: OrderId,
        /// Current status
        status: OrderStatus,
    },

    /// The server rejected the call or could not be reached.
    #[error("{source}")]
    Api {
        /// Failed operation
        operation: OrderOperation,
        /// Error surfaced by the API client
        source: ApiError,
    },
}

impl OrderError {
    /// Whether the command was rejected locally, before any network call
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        !matches!(self, Self::Api { .. })
    }
}

/// Local mirror of server-authoritative order data
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderState {
    /// The signed-in user's orders
    pub my_orders: Vec<Order>,
    /// Every order (admin view)
    pub all_orders: Vec<Order>,
    /// Order shown in the detail view
    pub current: Option<Order>,
    /// Round trips currently awaiting a result
    pub in_flight: HashSet<RequestId>,
}

impl OrderState {
    /// Whether any round trip is outstanding
    #[must_use]
    pub fn is_busy(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Look an order up in the mirrors ("all orders" first)
    #[must_use]
    pub fn find(&self, order_id: &OrderId) -> Option<&Order> {
        self.all_orders
            .iter()
            .chain(&self.my_orders)
            .chain(&self.current)
            .find(|order| &order.id == order_id)
    }

    fn begin_request(&mut self, request_id: RequestId) {
        self.in_flight.insert(request_id);
    }

    /// Settle a round trip; `false` for one this mirror no longer tracks
    fn finish_request(&mut self, request_id: RequestId) -> bool {
        let tracked = self.in_flight.remove(&request_id);
        if !tracked {
            tracing::debug!(%request_id, "Ignoring result of a forgotten request");
        }
        tracked
    }
}

/// Order intents and their results
#[derive(Clone, Debug, PartialEq)]
pub enum OrderAction {
    // Commands
    /// Submit a new order
    PlaceOrder {
        /// Correlation id
        request_id: RequestId,
        /// Order request
        order: NewOrder,
    },
    /// Load the signed-in user's orders
    FetchUserOrders {
        /// Correlation id
        request_id: RequestId,
    },
    /// Load every order (admin)
    FetchAllOrders {
        /// Correlation id
        request_id: RequestId,
    },
    /// Load one order into the detail view
    FetchOrder {
        /// Correlation id
        request_id: RequestId,
        /// Order to load
        order_id: OrderId,
    },
    /// Ask the server to cancel an order
    CancelOrder {
        /// Correlation id
        request_id: RequestId,
        /// Order to cancel
        order_id: OrderId,
    },
    /// Move an order to the next status (admin)
    UpdateOrderStatus {
        /// Correlation id
        request_id: RequestId,
        /// Order to update
        order_id: OrderId,
        /// Requested status
        status: OrderStatus,
    },
    /// Delete an order (admin)
    DeleteOrder {
        /// Correlation id
        request_id: RequestId,
        /// Order to delete
        order_id: OrderId,
    },
    /// Drop every mirror (sign-out)
    ClearOrders,

    // Results
    /// Server accepted a new order
    OrderPlaced {
        /// Correlation id
        request_id: RequestId,
        /// Created record
        order: Order,
    },
    /// User orders fetched
    UserOrdersLoaded {
        /// Correlation id
        request_id: RequestId,
        /// Server response
        orders: Vec<Order>,
    },
    /// All orders fetched
    AllOrdersLoaded {
        /// Correlation id
        request_id: RequestId,
        /// Server response
        orders: Vec<Order>,
    },
    /// Single order fetched
    OrderLoaded {
        /// Correlation id
        request_id: RequestId,
        /// Server response
        order: Order,
    },
    /// Server accepted the cancellation
    OrderCancelled {
        /// Correlation id
        request_id: RequestId,
        /// Cancelled order
        order_id: OrderId,
    },
    /// Server applied the status change
    OrderStatusUpdated {
        /// Correlation id
        request_id: RequestId,
        /// Updated record
        order: Order,
    },
    /// Server deleted the order
    OrderDeleted {
        /// Correlation id
        request_id: RequestId,
        /// Deleted order
        order_id: OrderId,
    },
    /// The round trip failed
    RequestFailed {
        /// Correlation id
        request_id: RequestId,
        /// Failure
        error: OrderError,
    },
    /// The command was refused before any network call
    Rejected {
        /// Correlation id
        request_id: RequestId,
        /// Validation failure
        error: OrderError,
    },
}

impl OrderAction {
    /// Whether this is the result action for `request_id`
    #[must_use]
    pub fn is_result_for(&self, request_id: RequestId) -> bool {
        match self {
            Self::OrderPlaced { request_id: id, .. }
            | Self::UserOrdersLoaded { request_id: id, .. }
            | Self::AllOrdersLoaded { request_id: id, .. }
            | Self::OrderLoaded { request_id: id, .. }
            | Self::OrderCancelled { request_id: id, .. }
            | Self::OrderStatusUpdated { request_id: id, .. }
            | Self::OrderDeleted { request_id: id, .. }
            | Self::RequestFailed { request_id: id, .. }
            | Self::Rejected { request_id: id, .. } => *id == request_id,
            _ => false,
        }
    }
}

/// Dependencies of the order reducer
#[derive(Clone)]
pub struct OrderEnvironment {
    /// Remote order endpoints
    pub api: Arc<dyn OrderApi>,
}

impl OrderEnvironment {
    /// Environment backed by `api`
    #[must_use]
    pub fn new(api: Arc<dyn OrderApi>) -> Self {
        Self { api }
    }
}

/// Reducer for the order mirror
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderReducer;

impl OrderReducer {
    /// Creates the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// One API call whose outcome is mapped to a result action
fn round_trip<T, Call, Done>(
    env: &OrderEnvironment,
    request_id: RequestId,
    operation: OrderOperation,
    call: Call,
    done: Done,
) -> Effect<OrderAction>
where
    T: Send + 'static,
    Call: for<'a> FnOnce(&'a dyn OrderApi) -> ApiFuture<'a, T> + Send + 'static,
    Done: FnOnce(T) -> OrderAction + Send + 'static,
{
    let api = Arc::clone(&env.api);
    Effect::future(async move {
        let outcome = call(&*api).await;
        Some(match outcome {
            Ok(value) => done(value),
            Err(source) => {
                tracing::warn!(%operation, %request_id, error = %source, "Order request failed");
                OrderAction::RequestFailed {
                    request_id,
                    error: OrderError::Api { operation, source },
                }
            },
        })
    })
}

/// Refusal delivered through the store like any other result
fn reject(request_id: RequestId, error: OrderError) -> Effect<OrderAction> {
    tracing::debug!(%request_id, %error, "Order command rejected");
    Effect::future(async move { Some(OrderAction::Rejected { request_id, error }) })
}

impl Reducer for OrderReducer {
    type State = OrderState;
    type Action = OrderAction;
    type Environment = OrderEnvironment;

    #[allow(clippy::too_many_lines)] // one arm per intent and result
    fn reduce(
        &self,
        state: &mut OrderState,
        action: OrderAction,
        env: &OrderEnvironment,
    ) -> SmallVec<[Effect<OrderAction>; 4]> {
        match action {
            OrderAction::PlaceOrder { request_id, order } => {
                if order.order_items.is_empty() {
                    return smallvec![reject(request_id, OrderError::EmptyOrder)];
                }
                state.begin_request(request_id);
                smallvec![round_trip(
                    env,
                    request_id,
                    OrderOperation::PlaceOrder,
                    move |api| api.place_order(order),
                    move |order| OrderAction::OrderPlaced { request_id, order },
                )]
            },

            OrderAction::FetchUserOrders { request_id } => {
                state.begin_request(request_id);
                smallvec![round_trip(
                    env,
                    request_id,
                    OrderOperation::FetchUserOrders,
                    |api| api.fetch_user_orders(),
                    move |orders| OrderAction::UserOrdersLoaded { request_id, orders },
                )]
            },

            OrderAction::FetchAllOrders { request_id } => {
                state.begin_request(request_id);
                smallvec![round_trip(
                    env,
                    request_id,
                    OrderOperation::FetchAllOrders,
                    |api| api.fetch_all_orders(),
                    move |orders| OrderAction::AllOrdersLoaded { request_id, orders },
                )]
            },

            OrderAction::FetchOrder { request_id, order_id } => {
                state.begin_request(request_id);
                smallvec![round_trip(
                    env,
                    request_id,
                    OrderOperation::FetchOrder,
                    move |api| api.fetch_order(order_id),
                    move |order| OrderAction::OrderLoaded { request_id, order },
                )]
            },

            OrderAction::CancelOrder { request_id, order_id } => {
                // Unknown orders are forwarded; the server has the final say.
                if let Some(order) = state.find(&order_id) {
                    if !order.is_cancellable() {
                        let status = order.order_status;
                        return smallvec![reject(
                            request_id,
                            OrderError::NotCancellable { order_id, status },
                        )];
                    }
                }
                state.begin_request(request_id);
                let cancelled = order_id.clone();
                smallvec![round_trip(
                    env,
                    request_id,
                    OrderOperation::CancelOrder,
                    move |api| api.cancel_order(order_id),
                    move |()| OrderAction::OrderCancelled {
                        request_id,
                        order_id: cancelled,
                    },
                )]
            },

            OrderAction::UpdateOrderStatus {
                request_id,
                order_id,
                status,
            } => {
                let Some(current) = state.find(&order_id).map(|order| order.order_status) else {
                    return smallvec![reject(request_id, OrderError::UnknownOrder(order_id))];
                };
                if !current.can_transition_to(status) {
                    return smallvec![reject(
                        request_id,
                        OrderError::TransitionNotAllowed {
                            order_id,
                            from: current,
                            to: status,
                        },
                    )];
                }
                state.begin_request(request_id);
                smallvec![round_trip(
                    env,
                    request_id,
                    OrderOperation::UpdateOrderStatus,
                    move |api| api.update_order_status(order_id, status),
                    move |order| OrderAction::OrderStatusUpdated { request_id, order },
                )]
            },

            OrderAction::DeleteOrder { request_id, order_id } => {
                state.begin_request(request_id);
                let deleted = order_id.clone();
                smallvec![round_trip(
                    env,
                    request_id,
                    OrderOperation::DeleteOrder,
                    move |api| api.delete_order(order_id),
                    move |()| OrderAction::OrderDeleted {
                        request_id,
                        order_id: deleted,
                    },
                )]
            },

            OrderAction::ClearOrders => {
                state.in_flight.clear();
                state.my_orders.clear();
                state.all_orders.clear();
                state.current = None;
                smallvec![Effect::None]
            },

            OrderAction::OrderPlaced { request_id, order } => {
                if !state.finish_request(request_id) {
                    return smallvec![Effect::None];
                }
                tracing::info!(order_id = %order.id, "Order placed");
                state.my_orders.push(order);
                smallvec![Effect::None]
            },

            OrderAction::UserOrdersLoaded { request_id, orders } => {
                if !state.finish_request(request_id) {
                    return smallvec![Effect::None];
                }
                state.my_orders = orders;
                smallvec![Effect::None]
            },

            OrderAction::AllOrdersLoaded { request_id, orders } => {
                if !state.finish_request(request_id) {
                    return smallvec![Effect::None];
                }
                state.all_orders = orders;
                smallvec![Effect::None]
            },

            OrderAction::OrderLoaded { request_id, order } => {
                if !state.finish_request(request_id) {
                    return smallvec![Effect::None];
                }
                state.current = Some(order);
                smallvec![Effect::None]
            },

            OrderAction::OrderCancelled { request_id, order_id } => {
                state.finish_request(request_id);
                tracing::info!(%order_id, "Order cancelled");
                smallvec![Effect::None]
            },

            OrderAction::OrderStatusUpdated { request_id, order } => {
                if !state.finish_request(request_id) {
                    return smallvec![Effect::None];
                }
                if let Some(slot) = state.all_orders.iter_mut().find(|o| o.id == order.id) {
                    *slot = order;
                }
                smallvec![Effect::None]
            },

            OrderAction::OrderDeleted { request_id, order_id } => {
                if !state.finish_request(request_id) {
                    return smallvec![Effect::None];
                }
                state.all_orders.retain(|order| order.id != order_id);
                smallvec![Effect::None]
            },

            OrderAction::RequestFailed { request_id, .. } => {
                state.finish_request(request_id);
                smallvec![Effect::None]
            },

            OrderAction::Rejected { .. } => smallvec![Effect::None],
        }
    }
}
