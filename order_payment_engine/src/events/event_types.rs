use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatus};

/// A new order has been persisted, either as cash on delivery or after a verified online capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// The order moved from `old_status` to the status in `order`. Emitted for fulfilment updates, cancellation requests
/// and adjudications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub old_status: OrderStatus,
    pub order: Order,
}

impl OrderStatusChangedEvent {
    pub fn new(old_status: OrderStatus, order: Order) -> Self {
        Self { old_status, order }
    }

    pub fn new_status(&self) -> OrderStatus {
        self.order.status
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RefundOutcome {
    /// The gateway accepted the refund.
    Initiated { refund_id: String },
    /// The gateway call failed. The refund can be retried.
    Failed { error: String },
    /// No refund was attempted (not requested, or not applicable to this order).
    NotAttempted,
}

impl RefundOutcome {
    pub fn is_initiated(&self) -> bool {
        matches!(self, RefundOutcome::Initiated { .. })
    }
}

/// A refund was attempted for a cancelled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundEvent {
    pub order: Order,
    pub outcome: RefundOutcome,
}

impl RefundEvent {
    pub fn new(order: Order, outcome: RefundOutcome) -> Self {
        Self { order, outcome }
    }
}
