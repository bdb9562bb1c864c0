use std::str::FromStr;

use opg_common::Money;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    db_types::{Order, OrderStatus, PaymentMethod, SelectedSize, ShippingAddress, TrackingEvent, TrackingStatus},
    events::RefundOutcome,
    ope_api::errors::OrderFlowError,
    state_machine::{Decision, TrackingUpdate},
};

/// A line item as submitted by a client. Only the product id, quantity and variant are trusted; name, price and image
/// are taken from the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftItem {
    #[serde(alias = "product")]
    pub product_id: String,
    pub qty: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_size: Option<SelectedSize>,
}

impl DraftItem {
    pub fn new<S: Into<String>>(product_id: S, qty: i64) -> Self {
        Self { product_id: product_id.into(), qty, ..Default::default() }
    }
}

/// An order as submitted by a client. Client-side totals are accepted for comparison only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderDraft {
    pub items: Vec<DraftItem>,
    #[serde(default)]
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<Money>,
}

impl OrderDraft {
    pub fn new(items: Vec<DraftItem>, shipping_address: ShippingAddress) -> Self {
        Self { items, shipping_address, ..Default::default() }
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    pub fn with_total_price(mut self, total: Money) -> Self {
        self.total_price = Some(total);
        self
    }
}

/// The tracking timeline of an order, as shown to its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingView {
    pub tracking: Vec<TrackingEvent>,
    pub status: OrderStatus,
}

impl From<Order> for TrackingView {
    fn from(order: Order) -> Self {
        Self { tracking: order.tracking, status: order.status }
    }
}

/// An admin tracking update as submitted over the wire. The status is validated against the tracking vocabulary
/// before it reaches the state machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingUpdateRequest {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, alias = "meta")]
    pub metadata: Option<Value>,
}

impl TrackingUpdateRequest {
    pub fn new<S: Into<String>>(status: S) -> Self {
        Self { status: status.into(), ..Default::default() }
    }

    pub fn with_message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl TryFrom<TrackingUpdateRequest> for TrackingUpdate {
    type Error = OrderFlowError;

    fn try_from(req: TrackingUpdateRequest) -> Result<Self, Self::Error> {
        let status =
            TrackingStatus::from_str(req.status.trim()).map_err(|e| OrderFlowError::ValidationError(e.to_string()))?;
        let metadata = match req.metadata {
            Some(Value::Null) | None => Value::Object(Default::default()),
            Some(v) => v,
        };
        Ok(TrackingUpdate::new(status)
            .with_message(req.message.unwrap_or_default())
            .with_location(req.location.unwrap_or_default())
            .with_metadata(metadata))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntentRequest {
    pub amount: Money,
}

/// Everything a browser checkout needs to collect a payment against a fresh intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentResponse {
    pub intent_id: String,
    pub amount: Money,
    pub currency: String,
    pub key_id: String,
}

/// The capture callback forwarded by the browser after a successful checkout, along with the order to create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRequest {
    #[serde(alias = "razorpay_order_id")]
    pub intent_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub capture_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
    #[serde(alias = "orderPayload")]
    pub order: OrderDraft,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancellationRequest {
    #[serde(default, alias = "reasonOption")]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

impl CancellationRequest {
    pub fn new<S: Into<String>>(reason: S, message: S) -> Self {
        Self { reason: reason.into(), message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjudicationAction {
    #[default]
    Approve,
    Reject,
}

impl From<AdjudicationAction> for Decision {
    fn from(action: AdjudicationAction) -> Self {
        match action {
            AdjudicationAction::Approve => Decision::Approve,
            AdjudicationAction::Reject => Decision::Reject,
        }
    }
}

/// The admin decision on a cancellation request. Both fields are optional on the wire: the default is to approve
/// without an immediate refund.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Adjudication {
    #[serde(default)]
    pub action: AdjudicationAction,
    #[serde(default, alias = "refundNow")]
    pub refund_now: bool,
}

impl Adjudication {
    pub fn approve(refund_now: bool) -> Self {
        Self { action: AdjudicationAction::Approve, refund_now }
    }

    pub fn reject() -> Self {
        Self { action: AdjudicationAction::Reject, refund_now: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicationOutcome {
    pub action: AdjudicationAction,
    pub order: Order,
    pub refund: RefundOutcome,
}

/// The result of a sweep over all orders with an outstanding refund.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundSweep {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}
