//! # Backend contracts
//!
//! This module defines the interfaces that storage backends and payment providers must expose in order to be used by
//! the order payment engine.
//!
//! * [`OrderManagement`] persists orders and their tracking timeline, and provides optimistic concurrency control
//!   through the order `version`.
//! * [`ProductCatalog`] is the read-only source of truth for product prices.
//! * [`PaymentGateway`] is the external, untrusted payment provider (intents, captures and refunds).
mod data_objects;
mod order_management;
mod payment_gateway;
mod product_catalog;

pub use data_objects::{InsertOrderResult, PaymentIntent, RefundReceipt};
pub use order_management::{OrderManagement, OrderStoreError};
pub use payment_gateway::{GatewayError, PaymentGateway};
pub use product_catalog::{CatalogError, ProductCatalog};
