//! # Order payment server
//! This crate hosts the HTTP server for the order payment engine. It is responsible for:
//! Authenticating callers with HS256 access tokens.
//! Translating requests into calls on the engine APIs, which enforce their own capability checks.
//! Connecting the engine to the Razorpay payment gateway, and retrying failed refunds in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/orders`: Cash-on-delivery order creation (POST) and the admin order list (GET).
//! * `/api/orders/mine`: The caller's orders.
//! * `/api/orders/payment/intent` and `/api/orders/payment/capture`: The two phases of an online payment.
//! * `/api/orders/{id}`, `/api/orders/{id}/tracking`: Order details and tracking history.
//! * `/api/orders/{id}/track`: Admin tracking updates.
//! * `/api/orders/{id}/cancel`, `/api/orders/{id}/cancel/handle`, `/api/orders/{id}/refund/retry`: Cancellations and
//!   refunds.

pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod refund_worker;
pub mod routes;
pub mod server;
