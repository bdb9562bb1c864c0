//! # Order payment engine public API
//!
//! The `ope_api` module exposes the programmatic API of the engine. It is split by workflow, so that clients can pick
//! the parts they need:
//!
//! * [`order_flow_api`] creates cash-on-delivery orders, answers order queries and drives the fulfilment state
//!   machine.
//! * [`payment_flow_api`] runs the two-phase online payment protocol (intent, then verified capture).
//! * [`cancellation_api`] handles cancellation requests, admin adjudication and refunds.
//!
//! Every operation takes the calling [`principal::Principal`] and performs its own capability checks.
//!
//! # API usage
//!
//! An API instance is created by supplying a backend that implements the traits the API needs, plus the event
//! producers that should be notified:
//!
//! ```rust,ignore
//! use order_payment_engine::{events::EventProducers, OrderFlowApi, Principal, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements OrderManagement and ProductCatalog
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let orders = api.orders_for_user(&Principal::customer("user-42")).await?;
//! ```
pub mod cancellation_api;
pub mod errors;
pub mod flow_support;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_flow_api;
pub mod pricing;
pub mod principal;
