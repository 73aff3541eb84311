//! Order Workflow Client: typed async calls over the order [`Store`].
//!
//! Each method sends one command with a fresh [`RequestId`] and waits for
//! the result action carrying that id. By the time a method returns, the
//! result has already been folded into the mirror, so the accessors reflect
//! it.
//!
//! Cancel, update and delete follow a two-step protocol: mutate, then
//! [`OrderWorkflow::refresh`]. The `*_and_refresh` helpers run both steps.
//!
//! By default a call waits as long as the HTTP client does. An optional
//! response timeout bounds the wait, but a timed-out call has an unknown
//! outcome: the server may still apply it and the mirror still records it.

use crate::api::OrderApi;
use crate::order::{NewOrder, Order, OrderStatus};
use crate::orders::{
    OrderAction, OrderEnvironment, OrderError, OrderOperation, OrderReducer, OrderState,
    RequestId,
};
use crate::types::OrderId;
use std::sync::Arc;
use std::time::Duration;
use storefront_runtime::{Store, StoreError};
use thiserror::Error;

/// Store running the order reducer
pub type OrderStore = Store<OrderState, OrderAction, OrderEnvironment, OrderReducer>;

/// Errors surfaced by [`OrderWorkflow`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// The command was rejected or the round trip failed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The store could not deliver a result.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A result arrived that does not belong to the operation.
    #[error("Unexpected result for {operation}")]
    UnexpectedResult {
        /// Operation that was awaiting its result
        operation: OrderOperation,
    },
}

/// Which mirror a refresh reloads
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshScope {
    /// The signed-in user's orders
    MyOrders,
    /// Every order (admin)
    AllOrders,
    /// One order into the detail view
    Order(OrderId),
}

/// Async client for the remote order workflow
#[derive(Clone)]
pub struct OrderWorkflow {
    store: OrderStore,
    response_timeout: Option<Duration>,
}

impl OrderWorkflow {
    /// Workflow with an empty mirror backed by `api`
    ///
    /// `response_timeout` of `None` waits for every outcome.
    #[must_use]
    pub fn new(api: Arc<dyn OrderApi>, response_timeout: Option<Duration>) -> Self {
        let store = Store::new(
            OrderState::default(),
            OrderReducer::new(),
            OrderEnvironment::new(api),
        );
        Self::from_store(store, response_timeout)
    }

    /// Workflow over an existing store
    #[must_use]
    pub const fn from_store(store: OrderStore, response_timeout: Option<Duration>) -> Self {
        Self {
            store,
            response_timeout,
        }
    }

    /// Underlying store
    #[must_use]
    pub const fn store(&self) -> &OrderStore {
        &self.store
    }

    async fn request(
        &self,
        command: impl FnOnce(RequestId) -> OrderAction,
    ) -> Result<OrderAction, WorkflowError> {
        let request_id = RequestId::new();
        let result = self
            .store
            .send_and_wait_for(
                command(request_id),
                move |action| action.is_result_for(request_id),
                self.response_timeout,
            )
            .await?;

        match result {
            OrderAction::RequestFailed { error, .. } | OrderAction::Rejected { error, .. } => {
                Err(WorkflowError::Order(error))
            },
            other => Ok(other),
        }
    }

    /// Submit an order; on success it is appended to "my orders".
    ///
    /// The cart is left untouched; clearing it is the caller's call.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError`] when the order is empty or the server
    /// rejects it. [`StoreError::Timeout`] means the outcome is unknown.
    #[tracing::instrument(skip_all, fields(items = order.order_items.len()))]
    pub async fn place_order(&self, order: NewOrder) -> Result<Order, WorkflowError> {
        match self
            .request(|request_id| OrderAction::PlaceOrder { request_id, order })
            .await?
        {
            OrderAction::OrderPlaced { order, .. } => Ok(order),
            _ => Err(WorkflowError::UnexpectedResult {
                operation: OrderOperation::PlaceOrder,
            }),
        }
    }

    /// Replace "my orders" with the server's list
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError`] when the fetch fails.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_user_orders(&self) -> Result<Vec<Order>, WorkflowError> {
        match self
            .request(|request_id| OrderAction::FetchUserOrders { request_id })
            .await?
        {
            OrderAction::UserOrdersLoaded { orders, .. } => Ok(orders),
            _ => Err(WorkflowError::UnexpectedResult {
                operation: OrderOperation::FetchUserOrders,
            }),
        }
    }

    /// Replace "all orders" with the server's list (admin)
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError`] when the fetch fails.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_all_orders(&self) -> Result<Vec<Order>, WorkflowError> {
        match self
            .request(|request_id| OrderAction::FetchAllOrders { request_id })
            .await?
        {
            OrderAction::AllOrdersLoaded { orders, .. } => Ok(orders),
            _ => Err(WorkflowError::UnexpectedResult {
                operation: OrderOperation::FetchAllOrders,
            }),
        }
    }

    /// Load one order as the current detail record
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError`] when the fetch fails.
    #[tracing::instrument(skip_all, fields(%order_id))]
    pub async fn fetch_order(&self, order_id: OrderId) -> Result<Order, WorkflowError> {
        match self
            .request(|request_id| OrderAction::FetchOrder { request_id, order_id })
            .await?
        {
            OrderAction::OrderLoaded { order, .. } => Ok(order),
            _ => Err(WorkflowError::UnexpectedResult {
                operation: OrderOperation::FetchOrder,
            }),
        }
    }

    /// Ask the server to cancel an order.
    ///
    /// The mirror is not changed; call [`OrderWorkflow::refresh`] (or use
    /// [`OrderWorkflow::cancel_and_refresh`]) to observe the new status.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError`] when a loaded order is past Confirmed or the
    /// server refuses.
    #[tracing::instrument(skip_all, fields(%order_id))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<(), WorkflowError> {
        match self
            .request(|request_id| OrderAction::CancelOrder { request_id, order_id })
            .await?
        {
            OrderAction::OrderCancelled { .. } => Ok(()),
            _ => Err(WorkflowError::UnexpectedResult {
                operation: OrderOperation::CancelOrder,
            }),
        }
    }

    /// Move an order to `status` (admin).
    ///
    /// The target must be in the transition table for the order's current
    /// status as known to the mirror; the updated record replaces the old
    /// one in "all orders".
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError`] for an unknown order, a disallowed
    /// transition, or a server failure.
    #[tracing::instrument(skip_all, fields(%order_id, %status))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, WorkflowError> {
        match self
            .request(|request_id| OrderAction::UpdateOrderStatus {
                request_id,
                order_id,
                status,
            })
            .await?
        {
            OrderAction::OrderStatusUpdated { order, .. } => Ok(order),
            _ => Err(WorkflowError::UnexpectedResult {
                operation: OrderOperation::UpdateOrderStatus,
            }),
        }
    }

    /// Delete an order (admin); on success it leaves "all orders".
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError`] when the server refuses.
    #[tracing::instrument(skip_all, fields(%order_id))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<(), WorkflowError> {
        match self
            .request(|request_id| OrderAction::DeleteOrder { request_id, order_id })
            .await?
        {
            OrderAction::OrderDeleted { .. } => Ok(()),
            _ => Err(WorkflowError::UnexpectedResult {
                operation: OrderOperation::DeleteOrder,
            }),
        }
    }

    /// Reload a mirror from the server
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError`] when the fetch fails.
    pub async fn refresh(&self, scope: RefreshScope) -> Result<(), WorkflowError> {
        match scope {
            RefreshScope::MyOrders => self.fetch_user_orders().await.map(drop),
            RefreshScope::AllOrders => self.fetch_all_orders().await.map(drop),
            RefreshScope::Order(order_id) => self.fetch_order(order_id).await.map(drop),
        }
    }

    /// Cancel, then reload `scope`
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error; a failed cancel skips the refresh.
    pub async fn cancel_and_refresh(
        &self,
        order_id: OrderId,
        scope: RefreshScope,
    ) -> Result<(), WorkflowError> {
        self.cancel_order(order_id).await?;
        self.refresh(scope).await
    }

    /// Update the status, then reload "all orders"
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn update_status_and_refresh(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, WorkflowError> {
        let order = self.update_order_status(order_id, status).await?;
        self.refresh(RefreshScope::AllOrders).await?;
        Ok(order)
    }

    /// Delete, then reload "all orders"
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn delete_and_refresh(&self, order_id: OrderId) -> Result<(), WorkflowError> {
        self.delete_order(order_id).await?;
        self.refresh(RefreshScope::AllOrders).await
    }

    /// Drop every mirror (used on sign-out)
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
    pub async fn clear(&self) -> Result<(), WorkflowError> {
        self.store.send(OrderAction::ClearOrders).await?;
        Ok(())
    }

    /// Stop accepting commands and wait for outstanding round trips
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if round trips are still
    /// running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), WorkflowError> {
        self.store.shutdown(timeout).await?;
        Ok(())
    }

    /// Snapshot of "my orders"
    pub async fn my_orders(&self) -> Vec<Order> {
        self.store.state(|s| s.my_orders.clone()).await
    }

    /// Snapshot of "all orders"
    pub async fn all_orders(&self) -> Vec<Order> {
        self.store.state(|s| s.all_orders.clone()).await
    }

    /// Current detail record
    pub async fn current_order(&self) -> Option<Order> {
        self.store.state(|s| s.current.clone()).await
    }

    /// Whether any round trip is outstanding
    pub async fn is_busy(&self) -> bool {
        self.store.state(OrderState::is_busy).await
    }
}

impl std::fmt::Debug for OrderWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderWorkflow")
            .field("response_timeout", &self.response_timeout)
            .finish_non_exhaustive()
    }
}
