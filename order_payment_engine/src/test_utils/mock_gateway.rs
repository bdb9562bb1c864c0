//! An in-memory payment gateway.
//!
//! Intents are kept in a map so that `fetch_intent` can reconcile amounts. Refunds can be switched to fail, to exercise
//! the retry paths, and every refund call is counted.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
        Mutex,
    },
};

use opg_common::Money;

use crate::{
    helpers::CaptureSignature,
    traits::{GatewayError, PaymentGateway, PaymentIntent, RefundReceipt},
};

pub const MOCK_KEY_ID: &str = "rzp_test_key";
pub const MOCK_KEY_SECRET: &str = "rzp_test_secret";

#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    intents: Arc<Mutex<HashMap<String, PaymentIntent>>>,
    refunds: Arc<Mutex<Vec<RefundReceipt>>>,
    next_id: Arc<AtomicU64>,
    fail_refunds: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
    refund_calls: Arc<AtomicU64>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent refund calls fail (or succeed again).
    pub fn fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    /// Makes every gateway call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn refund_calls(&self) -> u64 {
        self.refund_calls.load(Ordering::SeqCst)
    }

    pub fn refunds(&self) -> Vec<RefundReceipt> {
        self.refunds.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Simulates the customer paying for the intent. Returns the signed capture the browser would forward.
    pub fn pay(&self, intent_id: &str) -> CaptureSignature {
        let capture_id = format!("pay_{}", self.next());
        CaptureSignature::create(intent_id, &capture_id, MOCK_KEY_SECRET).expect("Failed to sign capture")
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(GatewayError::Unavailable("mock gateway is down".into()))
        } else {
            Ok(())
        }
    }
}

impl PaymentGateway for MockGateway {
    fn key_id(&self) -> &str {
        MOCK_KEY_ID
    }

    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        _receipt: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        self.check_available()?;
        let intent = PaymentIntent { intent_id: format!("order_{}", self.next()), amount, currency: currency.to_string() };
        let mut intents = self.intents.lock().map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        intents.insert(intent.intent_id.clone(), intent.clone());
        Ok(intent)
    }

    async fn fetch_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        self.check_available()?;
        let intents = self.intents.lock().map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        intents.get(intent_id).cloned().ok_or_else(|| GatewayError::Rejected {
            status: 400,
            message: format!("The id provided does not exist: {intent_id}"),
        })
    }

    async fn refund(&self, capture_id: &str, amount: Money) -> Result<RefundReceipt, GatewayError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 502,
                message: format!("Refund for {capture_id} could not be processed"),
            });
        }
        let receipt = RefundReceipt { refund_id: format!("rfnd_{}", self.next()), amount, status: "processed".into() };
        let mut refunds = self.refunds.lock().map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        refunds.push(receipt.clone());
        Ok(receipt)
    }
}
