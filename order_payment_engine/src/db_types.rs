//! Data types shared by the storage backends and the engine APIs.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use opg_common::Money;
use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};
use serde_json::Value;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh, random order id (UUID v4).
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("Order id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------          Role         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" | "user" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "COD")]
    Cod,
    #[serde(rename = "ONLINE")]
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "COD",
            PaymentMethod::Online => "ONLINE",
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(Self::Cod),
            "ONLINE" => Ok(Self::Online),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------      OrderStatus      ---------------------------------------------------------
/// The current (snapshot) status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Ordered,
    Packed,
    Shipped,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    Delivered,
    #[serde(rename = "Return Requested")]
    ReturnRequested,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Ordered => "Ordered",
            OrderStatus::Packed => "Packed",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::ReturnRequested => "Return Requested",
            OrderStatus::Returned => "Returned",
        }
    }

    /// True for the statuses an admin moves an order through during fulfilment.
    pub fn is_fulfillment(&self) -> bool {
        matches!(self, Self::Ordered | Self::Packed | Self::Shipped | Self::OutForDelivery | Self::Delivered)
    }

    /// Orders that have left the warehouse can no longer be cancelled.
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Shipped | Self::OutForDelivery | Self::Delivered)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ordered" => Ok(Self::Ordered),
            "Packed" => Ok(Self::Packed),
            "Shipped" => Ok(Self::Shipped),
            "Out for Delivery" => Ok(Self::OutForDelivery),
            "Delivered" => Ok(Self::Delivered),
            "Return Requested" => Ok(Self::ReturnRequested),
            "Returned" => Ok(Self::Returned),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------     TrackingStatus    ---------------------------------------------------------
/// The vocabulary of the tracking timeline. Every entry projects onto an [`OrderStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingStatus {
    Ordered,
    Packed,
    Shipped,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    Delivered,
    #[serde(rename = "Return Requested")]
    ReturnRequested,
    #[serde(rename = "Return Approved")]
    ReturnApproved,
    #[serde(rename = "Return Rejected")]
    ReturnRejected,
    #[serde(rename = "Return Picked Up")]
    ReturnPickedUp,
    Refunded,
}

impl TrackingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingStatus::Ordered => "Ordered",
            TrackingStatus::Packed => "Packed",
            TrackingStatus::Shipped => "Shipped",
            TrackingStatus::OutForDelivery => "Out for Delivery",
            TrackingStatus::Delivered => "Delivered",
            TrackingStatus::ReturnRequested => "Return Requested",
            TrackingStatus::ReturnApproved => "Return Approved",
            TrackingStatus::ReturnRejected => "Return Rejected",
            TrackingStatus::ReturnPickedUp => "Return Picked Up",
            TrackingStatus::Refunded => "Refunded",
        }
    }

    /// The fulfilment status this event moves an order into, if it is a fulfilment event.
    pub fn as_fulfillment(&self) -> Option<OrderStatus> {
        match self {
            TrackingStatus::Ordered => Some(OrderStatus::Ordered),
            TrackingStatus::Packed => Some(OrderStatus::Packed),
            TrackingStatus::Shipped => Some(OrderStatus::Shipped),
            TrackingStatus::OutForDelivery => Some(OrderStatus::OutForDelivery),
            TrackingStatus::Delivered => Some(OrderStatus::Delivered),
            _ => None,
        }
    }

    /// Events that only the cancellation workflow may append.
    pub fn is_cancellation_owned(&self) -> bool {
        matches!(self, Self::ReturnRequested | Self::ReturnApproved | Self::ReturnRejected)
    }
}

impl Display for TrackingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackingStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ordered" => Ok(Self::Ordered),
            "Packed" => Ok(Self::Packed),
            "Shipped" => Ok(Self::Shipped),
            "Out for Delivery" => Ok(Self::OutForDelivery),
            "Delivered" => Ok(Self::Delivered),
            "Return Requested" => Ok(Self::ReturnRequested),
            "Return Approved" => Ok(Self::ReturnApproved),
            "Return Rejected" => Ok(Self::ReturnRejected),
            "Return Picked Up" => Ok(Self::ReturnPickedUp),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid tracking status: {s}"))),
        }
    }
}

//--------------------------------------     TrackingEvent     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub status: TrackingStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub metadata: Value,
    pub timestamp: DateTime<Utc>,
}

impl TrackingEvent {
    pub fn new<S: Into<String>>(status: TrackingStatus, message: S, timestamp: DateTime<Utc>) -> Self {
        Self { status, message: message.into(), location: String::default(), metadata: Value::Null, timestamp }
    }
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
/// A frozen snapshot of the product variant the customer picked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectedSize {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub price: Money,
    pub qty: i64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub selected_size: Option<SelectedSize>,
}

impl OrderItem {
    /// `price * qty`, or `None` if the product overflows.
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_mul(self.qty)
    }
}

//--------------------------------------    ShippingAddress    ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingAddress {
    pub full_name: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub phone: String,
    pub landmark: String,
}

//--------------------------------------      PaymentInfo      ---------------------------------------------------------
/// Gateway references for an online order, kept for refunds and record keeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PaymentInfo {
    pub intent_id: String,
    pub capture_id: String,
    pub signature: String,
}

//--------------------------------------   CancellationRecord  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationState {
    Requested,
    Approved,
    Rejected,
}

impl CancellationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationState::Requested => "Requested",
            CancellationState::Approved => "Approved",
            CancellationState::Rejected => "Rejected",
        }
    }
}

impl Display for CancellationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CancellationState {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Requested" => Ok(Self::Requested),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            s => Err(ConversionError(format!("Invalid cancellation state: {s}"))),
        }
    }
}

/// The outcome flag exposed to clients that still read the flat cancellation format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationResult {
    None,
    Cancelled,
    Rejected,
}

impl From<CancellationState> for CancellationResult {
    fn from(state: CancellationState) -> Self {
        match state {
            CancellationState::Requested => Self::None,
            CancellationState::Approved => Self::Cancelled,
            CancellationState::Rejected => Self::Rejected,
        }
    }
}

/// A customer's cancellation request, and the bookkeeping for the admin decision and any refund that follows.
///
/// The record is created once per order and then mutated in place. `Requested` may move to `Approved` or `Rejected`;
/// both of those are final.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CancellationRecord {
    pub state: CancellationState,
    pub requested_at: DateTime<Utc>,
    pub reason: String,
    pub message: String,
    pub contact: String,
    pub previous_status: OrderStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
    pub refund_amount: Money,
    pub refund_initiated: bool,
    pub refund_id: Option<String>,
    pub refund_attempts: i64,
    pub last_refund_error: Option<String>,
}

impl CancellationRecord {
    pub fn is_processed(&self) -> bool {
        self.state != CancellationState::Requested
    }

    pub fn result(&self) -> CancellationResult {
        self.state.into()
    }
}

impl Serialize for CancellationRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("CancellationRecord", 16)?;
        s.serialize_field("state", &self.state)?;
        s.serialize_field("requested", &true)?;
        s.serialize_field("processed", &self.is_processed())?;
        s.serialize_field("result", &self.result())?;
        s.serialize_field("requested_at", &self.requested_at)?;
        s.serialize_field("reason", &self.reason)?;
        s.serialize_field("message", &self.message)?;
        s.serialize_field("contact", &self.contact)?;
        s.serialize_field("previous_status", &self.previous_status)?;
        s.serialize_field("processed_at", &self.processed_at)?;
        s.serialize_field("processed_by", &self.processed_by)?;
        s.serialize_field("refund_amount", &self.refund_amount)?;
        s.serialize_field("refund_initiated", &self.refund_initiated)?;
        s.serialize_field("refund_id", &self.refund_id)?;
        s.serialize_field("refund_attempts", &self.refund_attempts)?;
        s.serialize_field("last_refund_error", &self.last_refund_error)?;
        s.end()
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_info: Option<PaymentInfo>,
    pub status: OrderStatus,
    pub tracking: Vec<TrackingEvent>,
    pub cancellation: Option<CancellationRecord>,
    pub items_price: Money,
    pub shipping_price: Money,
    pub tax_price: Money,
    pub total_price: Money,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter. Incremented by the store on every successful save.
    pub version: i64,
}

impl Order {
    pub fn is_online_and_paid(&self) -> bool {
        self.payment_method == PaymentMethod::Online && self.payment_status == PaymentStatus::Paid
    }

    pub fn last_event(&self) -> Option<&TrackingEvent> {
        self.tracking.last()
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
/// A fully priced order, ready to be persisted. The store assigns the id and seeds the tracking timeline.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_info: Option<PaymentInfo>,
    pub items_price: Money,
    pub shipping_price: Money,
    pub tax_price: Money,
    pub total_price: Money,
    pub paid_at: Option<DateTime<Utc>>,
    /// The message recorded against the initial `Ordered` tracking event.
    pub initial_message: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     CatalogProduct    ---------------------------------------------------------
/// The authoritative price data for a product, as used by server-side pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    pub price: Money,
    pub image: Option<String>,
}
