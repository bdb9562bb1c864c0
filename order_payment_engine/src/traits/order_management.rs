use thiserror::Error;

use crate::{
    db_types::{ConversionError, NewOrder, Order, OrderId},
    traits::InsertOrderResult,
};

/// The `OrderManagement` trait defines the persistence contract for orders.
///
/// Orders are never deleted. Tracking events are append-only: once stored, a tracking row is never modified.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Assigns a new id, seeds the tracking timeline with the creation event, and stores the order, its items and
    /// payment references in a single transaction.
    ///
    /// For online orders, `(intent_id, capture_id)` is unique. Inserting a second order with the same pair is not an
    /// error: the existing order is returned as [`InsertOrderResult::AlreadyExists`].
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, OrderStoreError>;

    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, OrderStoreError>;

    /// Fetches the order that was created for the given gateway capture, if any.
    async fn fetch_order_by_capture(
        &self,
        intent_id: &str,
        capture_id: &str,
    ) -> Result<Option<Order>, OrderStoreError>;

    /// All orders for the user, most recent first.
    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderStoreError>;

    /// All orders in the system, most recent first.
    async fn fetch_all_orders(&self) -> Result<Vec<Order>, OrderStoreError>;

    /// Persists the mutable parts of the order (status, flags, payment status, cancellation record) and appends any
    /// tracking events that have not been stored yet, all in one transaction.
    ///
    /// The save only succeeds if the stored `version` matches `order.version`. Otherwise nothing is written and
    /// [`OrderStoreError::VersionConflict`] is returned. On success the freshly stored order is returned, with its
    /// version incremented.
    async fn save_order(&self, order: &Order) -> Result<Order, OrderStoreError>;

    /// Orders with an approved cancellation on a paid online payment where the refund has not been initiated yet.
    async fn fetch_orders_with_pending_refunds(&self) -> Result<Vec<Order>, OrderStoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} was modified by someone else. Reload and try again.")]
    VersionConflict(OrderId),
    #[error("A payment with intent {intent_id} and capture {capture_id} has already been recorded")]
    DuplicateCapture { intent_id: String, capture_id: String },
    #[error("Stored data could not be interpreted: {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for OrderStoreError {
    fn from(e: serde_json::Error) -> Self {
        OrderStoreError::InvalidData(e.to_string())
    }
}

impl From<ConversionError> for OrderStoreError {
    fn from(e: ConversionError) -> Self {
        OrderStoreError::InvalidData(e.to_string())
    }
}
