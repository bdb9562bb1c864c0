//! Adapts the Razorpay REST client to the engine's [`PaymentGateway`] contract.
//!
//! Razorpay calls its payment reservation an "order" and its captured payments "payments". In engine terms these are
//! the intent and the capture respectively. Amounts cross this boundary in minor units (paise).
use log::*;
use opg_common::Money;
use order_payment_engine::traits::{GatewayError, PaymentGateway, PaymentIntent, RefundReceipt};
use razorpay_tools::{NewRazorpayOrder, RazorpayApi, RazorpayApiError, RazorpayConfig, RazorpayOrder, RazorpayRefund};

#[derive(Clone)]
pub struct RazorpayGateway {
    api: RazorpayApi,
    timeout_secs: u64,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> Result<Self, GatewayError> {
        let timeout_secs = config.timeout.as_secs();
        let api = RazorpayApi::new(config).map_err(|e| gateway_error(e, timeout_secs))?;
        Ok(Self { api, timeout_secs })
    }
}

impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        self.api.key_id()
    }

    async fn create_intent(&self, amount: Money, currency: &str, receipt: &str) -> Result<PaymentIntent, GatewayError> {
        let order = NewRazorpayOrder { amount: amount.value(), currency: currency.to_string(), receipt: receipt.into() };
        let result = self.api.create_order(order).await.map_err(|e| gateway_error(e, self.timeout_secs))?;
        Ok(intent_from_order(result))
    }

    async fn fetch_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let order = self.api.fetch_order(intent_id).await.map_err(|e| gateway_error(e, self.timeout_secs))?;
        trace!("💳️ Razorpay order {intent_id} is '{}' with {} of {} paid", order.status, order.amount_paid, order.amount);
        Ok(intent_from_order(order))
    }

    async fn refund(&self, capture_id: &str, amount: Money) -> Result<RefundReceipt, GatewayError> {
        let refund = self.api.refund_payment(capture_id, amount.value()).await.map_err(|e| gateway_error(e, self.timeout_secs))?;
        Ok(receipt_from_refund(refund))
    }
}

fn intent_from_order(order: RazorpayOrder) -> PaymentIntent {
    PaymentIntent { intent_id: order.id, amount: Money::from_minor(order.amount), currency: order.currency }
}

fn receipt_from_refund(refund: RazorpayRefund) -> RefundReceipt {
    RefundReceipt { refund_id: refund.id, amount: Money::from_minor(refund.amount), status: refund.status }
}

fn gateway_error(e: RazorpayApiError, timeout_secs: u64) -> GatewayError {
    match e {
        RazorpayApiError::Initialization(s) | RazorpayApiError::RequestError(s) => GatewayError::Unavailable(s),
        RazorpayApiError::Timeout => GatewayError::Timeout(timeout_secs),
        RazorpayApiError::JsonError(s) => GatewayError::InvalidResponse(s),
        RazorpayApiError::QueryError { status, message } => GatewayError::Rejected { status, message },
    }
}
