//! # Order state machine
//!
//! Pure functions that move an [`Order`] between states. Nothing in here touches the store or the gateway; the engine
//! APIs load an order, call into this module, and persist the result with a version-guarded save.
//!
//! Two families of transitions exist:
//! * **Fulfilment**, driven by an admin through [`apply_transition`]: `Ordered`, `Packed`, `Shipped`,
//!   `Out for Delivery`, `Delivered`, plus the post-return informational events `Return Picked Up` and `Refunded`.
//! * **Cancellation**, driven by the customer and then adjudicated by an admin. The cancellation record is a tagged
//!   state (`Requested -> Approved | Rejected`) and owns the `Return Requested/Approved/Rejected` tracking events.
//!
//! Every transition appends exactly one tracking event with a server-assigned timestamp, so `order.status` always
//! equals [`projected_status`] of the order.
use chrono::{DateTime, Utc};
use log::*;
use opg_common::Money;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::{
    db_types::{
        CancellationRecord,
        CancellationState,
        Order,
        OrderStatus,
        PaymentStatus,
        TrackingEvent,
        TrackingStatus,
    },
    traits::RefundReceipt,
};

pub const REVERTED_FROM_KEY: &str = "reverted_from";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{0} cannot be set directly. It is managed by the cancellation workflow.")]
    InvalidStatus(TrackingStatus),
    #[error("Cannot move order from {from} to {to}")]
    Illegal { from: OrderStatus, to: TrackingStatus },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancellationError {
    #[error("Orders that are {0} cannot be cancelled")]
    NotAllowed(OrderStatus),
    #[error("A cancellation has already been requested for this order")]
    AlreadyRequested,
    #[error("The cancellation request for this order has already been processed")]
    AlreadyProcessed,
    #[error("No cancellation request found for this order")]
    NoActiveCancellation,
    #[error("No refund is due for this order: {0}")]
    RefundNotApplicable(String),
}

/// An admin-supplied tracking update. The timestamp is always assigned by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingUpdate {
    pub status: TrackingStatus,
    pub message: String,
    pub location: String,
    pub metadata: Value,
}

impl TrackingUpdate {
    pub fn new(status: TrackingStatus) -> Self {
        Self { status, message: String::default(), location: String::default(), metadata: Value::Null }
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_location<S: Into<String>>(mut self, location: S) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// What a successful [`apply_transition`] did to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEffect {
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    /// True if the order was marked delivered and this transition cleared the delivery flags.
    pub delivery_reverted: bool,
}

/// The admin decision on a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Applies an admin tracking update to the order.
///
/// Fulfilment statuses set `order.status`. Entering `Delivered` sets the delivery flags; moving to any other
/// fulfilment status clears them again. That revert is recorded in the event metadata under `reverted_from`.
pub fn apply_transition(
    order: &mut Order,
    update: &TrackingUpdate,
    now: DateTime<Utc>,
) -> Result<TransitionEffect, TransitionError> {
    let old_status = order.status;
    let illegal = || TransitionError::Illegal { from: old_status, to: update.status };
    if update.status.is_cancellation_owned() {
        return Err(TransitionError::InvalidStatus(update.status));
    }
    let mut metadata = update.metadata.clone();
    let mut delivery_reverted = false;
    match update.status.as_fulfillment() {
        Some(target) => {
            if matches!(old_status, OrderStatus::ReturnRequested | OrderStatus::Returned) {
                return Err(illegal());
            }
            if target == OrderStatus::Delivered {
                order.is_delivered = true;
                order.delivered_at = Some(now);
            } else if order.is_delivered {
                warn!(
                    "🔄️ Order {} was marked as delivered and is being moved back to {target}. Clearing the delivery \
                     flags.",
                    order.id
                );
                order.is_delivered = false;
                order.delivered_at = None;
                metadata = with_revert_marker(metadata);
                delivery_reverted = true;
            }
            order.status = target;
        },
        None => {
            // Return Picked Up and Refunded are informational events on an already returned order.
            if old_status != OrderStatus::Returned {
                return Err(illegal());
            }
            if update.status == TrackingStatus::Refunded {
                order.payment_status = PaymentStatus::Refunded;
            }
        },
    }
    order.tracking.push(TrackingEvent {
        status: update.status,
        message: update.message.clone(),
        location: update.location.clone(),
        metadata,
        timestamp: now,
    });
    order.updated_at = now;
    Ok(TransitionEffect { old_status, new_status: order.status, delivery_reverted })
}

fn with_revert_marker(metadata: Value) -> Value {
    let marker = Value::String(OrderStatus::Delivered.as_str().to_string());
    let mut map = match metadata {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("details".to_string(), other);
            map
        },
    };
    map.insert(REVERTED_FROM_KEY.to_string(), marker);
    Value::Object(map)
}

/// The status implied by the last tracking event, or `None` for an order with no timeline.
pub fn projected_status(order: &Order) -> Option<OrderStatus> {
    let last = order.last_event()?;
    let status = match last.status {
        TrackingStatus::ReturnRequested => OrderStatus::ReturnRequested,
        TrackingStatus::ReturnRejected => order.cancellation.as_ref()?.previous_status,
        TrackingStatus::ReturnApproved | TrackingStatus::ReturnPickedUp | TrackingStatus::Refunded => {
            OrderStatus::Returned
        },
        s => s.as_fulfillment()?,
    };
    Some(status)
}

/// Opens a cancellation request on the order.
///
/// Only orders that have not been dispatched can be cancelled. The refund owed is the full order total for paid
/// online orders and zero otherwise.
pub fn request_cancellation(
    order: &mut Order,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Result<(), CancellationError> {
    if let Some(record) = &order.cancellation {
        return match record.state {
            CancellationState::Requested => Err(CancellationError::AlreadyRequested),
            _ => Err(CancellationError::AlreadyProcessed),
        };
    }
    if order.status.is_dispatched() || matches!(order.status, OrderStatus::ReturnRequested | OrderStatus::Returned) {
        return Err(CancellationError::NotAllowed(order.status));
    }
    let refund_amount = if order.is_online_and_paid() { order.total_price } else { Money::default() };
    order.cancellation = Some(CancellationRecord {
        state: CancellationState::Requested,
        requested_at: now,
        reason: reason.to_string(),
        message: message.to_string(),
        contact: order.shipping_address.phone.clone(),
        previous_status: order.status,
        processed_at: None,
        processed_by: None,
        refund_amount,
        refund_initiated: false,
        refund_id: None,
        refund_attempts: 0,
        last_refund_error: None,
    });
    let reason = if reason.trim().is_empty() { "No reason provided" } else { reason };
    let event_message = format!("Cancellation requested by user: {reason}");
    order.tracking.push(TrackingEvent::new(TrackingStatus::ReturnRequested, event_message, now));
    order.status = OrderStatus::ReturnRequested;
    order.updated_at = now;
    Ok(())
}

/// Resolves an open cancellation request. Approval moves the order to `Returned`; rejection restores the status the
/// order had when the request was made. Neither decision touches the payment.
pub fn adjudicate(
    order: &mut Order,
    decision: Decision,
    admin_id: &str,
    now: DateTime<Utc>,
) -> Result<(), CancellationError> {
    let record = order.cancellation.as_mut().ok_or(CancellationError::NoActiveCancellation)?;
    if record.is_processed() {
        return Err(CancellationError::AlreadyProcessed);
    }
    record.processed_at = Some(now);
    record.processed_by = Some(admin_id.to_string());
    let event = match decision {
        Decision::Approve => {
            record.state = CancellationState::Approved;
            order.status = OrderStatus::Returned;
            TrackingEvent::new(TrackingStatus::ReturnApproved, "Cancellation approved by admin", now)
        },
        Decision::Reject => {
            record.state = CancellationState::Rejected;
            order.status = record.previous_status;
            TrackingEvent::new(TrackingStatus::ReturnRejected, "Cancellation request rejected by admin", now)
        },
    };
    order.tracking.push(event);
    order.updated_at = now;
    Ok(())
}

/// A refund that is due on an order: the gateway capture to refund against and the amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundDue {
    pub capture_id: String,
    pub amount: Money,
}

/// Checks whether a refund should be sent to the gateway for this order.
pub fn refund_eligibility(order: &Order) -> Result<RefundDue, CancellationError> {
    let not_applicable = |s: &str| CancellationError::RefundNotApplicable(s.to_string());
    let record = order.cancellation.as_ref().ok_or_else(|| not_applicable("the order has no cancellation"))?;
    if record.state != CancellationState::Approved {
        return Err(not_applicable("the cancellation has not been approved"));
    }
    if record.refund_initiated {
        return Err(not_applicable("the refund has already been initiated"));
    }
    if !order.is_online_and_paid() {
        return Err(not_applicable("the order was not paid online"));
    }
    let capture_id = order
        .payment_info
        .as_ref()
        .map(|p| p.capture_id.clone())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| not_applicable("the order has no payment capture reference"))?;
    let amount = if record.refund_amount.is_positive() { record.refund_amount } else { order.total_price };
    Ok(RefundDue { capture_id, amount })
}

/// Records a successful gateway refund. Marks the payment as refunded and appends a `Refunded` event.
pub fn record_refund_success(order: &mut Order, receipt: &RefundReceipt, now: DateTime<Utc>) {
    if let Some(record) = order.cancellation.as_mut() {
        record.refund_attempts += 1;
        record.refund_initiated = true;
        record.refund_id = Some(receipt.refund_id.clone());
        record.refund_amount = receipt.amount;
        record.last_refund_error = None;
    }
    order.payment_status = PaymentStatus::Refunded;
    let message = format!("Refund of {} initiated (refund id {})", receipt.amount, receipt.refund_id);
    let mut event = TrackingEvent::new(TrackingStatus::Refunded, message, now);
    event.metadata = json!({ "refund_id": receipt.refund_id, "refund_status": receipt.status });
    order.tracking.push(event);
    order.updated_at = now;
}

/// Records a failed refund attempt. The order status and the approval are left alone so the refund can be retried.
pub fn record_refund_failure(order: &mut Order, error: &str, now: DateTime<Utc>) {
    if let Some(record) = order.cancellation.as_mut() {
        record.refund_attempts += 1;
        record.last_refund_error = Some(error.to_string());
    }
    order.updated_at = now;
}
