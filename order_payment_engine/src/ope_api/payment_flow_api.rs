//! The two-phase online payment protocol.
//!
//! 1. **Intent.** The customer asks for a payment reservation of a given amount. The gateway returns an intent id,
//!    which the browser checkout uses to collect the payment. Nothing is stored on our side.
//! 2. **Capture.** After paying, the browser forwards the gateway's `(intent_id, capture_id, signature)` triple and
//!    the order it wants to create. The signature is checked against the shared key secret, the order is re-priced
//!    from the catalog, the intent amount is reconciled with the order total, and only then is the order persisted,
//!    already `Paid`.
//!
//! Captures are idempotent. The `(intent_id, capture_id)` pair can only ever produce one order, so a browser that
//! retries the capture gets the original order back.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use opg_common::{helpers::receipt_reference, Money, Secret};

use crate::{
    db_types::{NewOrder, Order, PaymentInfo, PaymentMethod, PaymentStatus},
    events::{EventProducers, OrderCreatedEvent},
    helpers::verify_capture,
    ope_api::{
        errors::OrderFlowError,
        flow_support::{call_gateway, FlowOptions},
        order_objects::{CaptureRequest, IntentResponse},
        pricing::price_draft,
        principal::Principal,
    },
    traits::{InsertOrderResult, OrderManagement, PaymentGateway, ProductCatalog},
};

pub const ONLINE_ORDER_MESSAGE: &str = "Order placed after successful payment";

pub struct PaymentFlowApi<B, G> {
    db: B,
    gateway: G,
    signing_secret: Secret<String>,
    producers: EventProducers,
    options: FlowOptions,
}

impl<B, G> Debug for PaymentFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B, G> PaymentFlowApi<B, G> {
    /// `signing_secret` is the gateway key secret used to verify capture signatures.
    pub fn new(db: B, gateway: G, signing_secret: Secret<String>, producers: EventProducers) -> Self {
        Self { db, gateway, signing_secret, producers, options: FlowOptions::default() }
    }

    pub fn with_options(mut self, options: FlowOptions) -> Self {
        self.options = options;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> PaymentFlowApi<B, G>
where
    B: OrderManagement + ProductCatalog,
    G: PaymentGateway,
{
    /// Reserves a payment of `amount` with the gateway. The store is not touched.
    pub async fn create_intent(&self, principal: &Principal, amount: Money) -> Result<IntentResponse, OrderFlowError> {
        if !amount.is_positive() {
            return Err(OrderFlowError::ValidationError("Amount missing or invalid".into()));
        }
        let receipt = receipt_reference(Utc::now().timestamp_millis());
        let currency = self.options.currency.as_str();
        let intent =
            call_gateway(self.options.gateway_timeout, self.gateway.create_intent(amount, currency, &receipt)).await?;
        info!("💳️ Payment intent {} for {amount} {currency} created for user {}", intent.intent_id, principal.user_id);
        Ok(IntentResponse {
            intent_id: intent.intent_id,
            amount: intent.amount,
            currency: intent.currency,
            key_id: self.gateway.key_id().to_string(),
        })
    }

    /// Verifies a payment capture and creates the paid order.
    ///
    /// Returns [`InsertOrderResult::AlreadyExists`] when this capture has been processed before. Nothing is stored if
    /// the signature is invalid, the catalog rejects the draft, or the captured amount differs from the order total.
    /// In the last case the captured amount is refunded straight away.
    pub async fn capture(
        &self,
        principal: &Principal,
        request: CaptureRequest,
    ) -> Result<InsertOrderResult, OrderFlowError> {
        let CaptureRequest { intent_id, capture_id, signature, order: draft } = request;
        if !verify_capture(&intent_id, &capture_id, &signature, self.signing_secret.reveal()) {
            warn!("💳️ Capture {capture_id} for intent {intent_id} has an invalid signature. User: {}", principal.user_id);
            return Err(OrderFlowError::InvalidSignature);
        }
        if let Some(existing) = self.db.fetch_order_by_capture(&intent_id, &capture_id).await? {
            debug!("💳️ Capture {capture_id} was already processed as order {}", existing.id);
            return Self::existing_for(principal, existing);
        }
        let priced = price_draft(&self.db, &self.options.pricing, &draft).await?;
        let intent = call_gateway(self.options.gateway_timeout, self.gateway.fetch_intent(&intent_id)).await?;
        if intent.amount != priced.quote.total_price {
            warn!(
                "💳️ Intent {intent_id} was for {} but the order comes to {}. Refusing to create the order.",
                intent.amount, priced.quote.total_price
            );
            let refund_id = self.refund_rejected_capture(&capture_id, intent.amount).await;
            return Err(OrderFlowError::AmountMismatch {
                expected: priced.quote.total_price,
                captured: intent.amount,
                refund_id,
            });
        }
        let now = Utc::now();
        let new_order = NewOrder {
            user_id: principal.user_id.clone(),
            items: priced.items,
            shipping_address: draft.shipping_address,
            payment_method: PaymentMethod::Online,
            payment_status: PaymentStatus::Paid,
            payment_info: Some(PaymentInfo { intent_id, capture_id, signature }),
            items_price: priced.quote.items_price,
            shipping_price: priced.quote.shipping_price,
            tax_price: priced.quote.tax_price,
            total_price: priced.quote.total_price,
            paid_at: Some(now),
            initial_message: ONLINE_ORDER_MESSAGE.to_string(),
            created_at: now,
        };
        match self.db.insert_order(new_order).await? {
            InsertOrderResult::Inserted(order) => {
                info!("💳️ Online order {} created for user {} ({} paid)", order.id, order.user_id, order.total_price);
                self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
                Ok(InsertOrderResult::Inserted(order))
            },
            InsertOrderResult::AlreadyExists(order) => Self::existing_for(principal, order),
        }
    }

    /// Returns the money taken for a capture that will not become an order.
    async fn refund_rejected_capture(&self, capture_id: &str, amount: Money) -> Option<String> {
        match call_gateway(self.options.gateway_timeout, self.gateway.refund(capture_id, amount)).await {
            Ok(receipt) => {
                info!("💳️ Refunded {amount} for rejected capture {capture_id}. Refund id: {}", receipt.refund_id);
                Some(receipt.refund_id)
            },
            Err(e) => {
                error!("💳️ Could not refund {amount} for rejected capture {capture_id}. Manual refund required. {e}");
                None
            },
        }
    }

    fn existing_for(principal: &Principal, order: Order) -> Result<InsertOrderResult, OrderFlowError> {
        if order.user_id == principal.user_id {
            Ok(InsertOrderResult::AlreadyExists(order))
        } else {
            warn!(
                "💳️ User {} submitted a capture that belongs to order {} of another user",
                principal.user_id, order.id
            );
            Err(OrderFlowError::Forbidden("This payment has already been used for another order".into()))
        }
    }
}
