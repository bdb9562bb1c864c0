mod api;
mod config;
mod data_objects;
mod error;

pub use api::RazorpayApi;
pub use config::{RazorpayConfig, DEFAULT_RAZORPAY_API_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use data_objects::{NewRazorpayOrder, NewRefund, RazorpayOrder, RazorpayRefund};
pub use error::RazorpayApiError;
