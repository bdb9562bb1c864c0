use opg_common::Money;
use thiserror::Error;

use crate::traits::{PaymentIntent, RefundReceipt};

/// The external payment provider.
///
/// Implementations should not retry internally. The engine wraps every call in a timeout and decides what a failure
/// means for the order.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// The public key id that a browser checkout needs alongside the intent id.
    fn key_id(&self) -> &str;

    /// Reserves a payment of `amount` with the provider.
    async fn create_intent(&self, amount: Money, currency: &str, receipt: &str)
        -> Result<PaymentIntent, GatewayError>;

    /// Fetches an existing intent, used to reconcile the captured amount with the order total.
    async fn fetch_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError>;

    /// Refunds `amount` against a captured payment.
    async fn refund(&self, capture_id: &str, amount: Money) -> Result<RefundReceipt, GatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway is unavailable: {0}")]
    Unavailable(String),
    #[error("The payment gateway did not respond within {0} seconds")]
    Timeout(u64),
    #[error("The payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("The payment gateway returned an unexpected response: {0}")]
    InvalidResponse(String),
}
