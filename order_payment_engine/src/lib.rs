//! Order Payment Engine
//!
//! The order payment engine tracks a customer order from placement through fulfilment or cancellation, and keeps it
//! consistent with an external, untrusted payment gateway. This library contains the core logic. It is
//! provider-agnostic: the gateway, the order store and the product catalog are all traits.
//!
//! The library is divided into these main sections:
//! 1. Data types ([`mod@db_types`]) and the backend contracts ([`mod@traits`]). A SQLite backend is provided as
//!    [`SqliteDatabase`].
//! 2. The order state machine ([`mod@state_machine`]). Pure functions for fulfilment transitions, the cancellation
//!    workflow and refund bookkeeping.
//! 3. The public API ([`OrderFlowApi`], [`PaymentFlowApi`], [`CancellationApi`]). Every operation takes the calling
//!    [`Principal`] and performs its own capability checks.
//!
//! The engine also emits events ([`mod@events`]) when orders are created, change status or are refunded. A simple
//! actor framework lets you hook into these and perform custom actions.
mod db;

pub mod db_types;
pub mod events;
pub mod helpers;
mod ope_api;
pub mod state_machine;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use ope_api::{
    cancellation_api::CancellationApi,
    errors::OrderFlowError,
    flow_support::{FlowOptions, DEFAULT_GATEWAY_TIMEOUT, DEFAULT_MAX_SAVE_RETRIES},
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_flow_api::PaymentFlowApi,
    pricing::{PriceQuote, PricingPolicy, MAX_ITEM_QTY},
    principal::Principal,
};
pub use traits::{
    CatalogError,
    GatewayError,
    InsertOrderResult,
    OrderManagement,
    OrderStoreError,
    PaymentGateway,
    PaymentIntent,
    ProductCatalog,
    RefundReceipt,
};
