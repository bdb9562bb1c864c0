use std::str::FromStr;

use cucumber::{given, then, when};
use opg_common::Money;
use order_payment_engine::{
    db_types::{CancellationResult, OrderStatus, PaymentMethod, PaymentStatus},
    events::RefundOutcome,
    order_objects::{Adjudication, CancellationRequest, CaptureRequest, TrackingUpdateRequest},
    test_utils::fixtures::draft_for,
    OrderFlowError,
    OrderManagement,
    Principal,
};

use crate::{cucumber::OrderWorld, support::TestSystem};

fn admin() -> Principal {
    Principal::admin("admin")
}

fn error_kind(e: &OrderFlowError) -> &'static str {
    match e {
        OrderFlowError::ValidationError(_) => "ValidationError",
        OrderFlowError::OrderNotFound(_) => "OrderNotFound",
        OrderFlowError::Forbidden(_) => "Forbidden",
        OrderFlowError::IllegalTransition(_) => "IllegalTransition",
        OrderFlowError::CancellationNotAllowed(_) => "CancellationNotAllowed",
        OrderFlowError::AlreadyRequested => "AlreadyRequested",
        OrderFlowError::NoActiveCancellation => "NoActiveCancellation",
        OrderFlowError::AlreadyProcessed => "AlreadyProcessed",
        OrderFlowError::RefundNotApplicable(_) => "RefundNotApplicable",
        OrderFlowError::AmountMismatch { .. } => "AmountMismatch",
        OrderFlowError::InvalidSignature => "InvalidSignature",
        OrderFlowError::GatewayUnavailable(_) => "GatewayUnavailable",
        OrderFlowError::RefundFailed(_) => "RefundFailed",
        OrderFlowError::StorageConflict(_) => "StorageConflict",
        OrderFlowError::DatabaseError(_) => "DatabaseError",
    }
}

#[given("a fresh order system")]
async fn fresh_system(world: &mut OrderWorld) {
    world.system = Some(TestSystem::new().await);
}

#[given("refunds are failing at the gateway")]
async fn refunds_fail(world: &mut OrderWorld) {
    world.system().gateway.fail_refunds(true);
}

#[when("the gateway recovers")]
async fn gateway_recovers(world: &mut OrderWorld) {
    world.system().gateway.fail_refunds(false);
    world.system().gateway.set_unavailable(false);
}

#[when(expr = "customer '{word}' places a cash on delivery order for {int} {word}")]
async fn place_cod_order(world: &mut OrderWorld, user: String, qty: i64, product: String) {
    let result = world.system().orders.create_cod_order(&Principal::customer(&user), draft_for(&product, qty)).await;
    world.record(result);
}

#[when(expr = "the admin marks the order as {string}")]
async fn mark_order(world: &mut OrderWorld, status: String) {
    let id = world.order().id.clone();
    let result = world.system().orders.update_tracking(&admin(), &id, TrackingUpdateRequest::new(status)).await;
    world.record(result);
}

#[when(expr = "customer '{word}' creates a payment intent for {word}")]
async fn create_intent(world: &mut OrderWorld, user: String, amount: String) {
    let amount = Money::from_str(&amount).expect("Invalid amount");
    let result = world.system().payments.create_intent(&Principal::customer(&user), amount).await;
    match result {
        Ok(intent) => world.intent = Some(intent),
        Err(e) => world.last_error = Some(e),
    }
}

#[when("the customer completes the payment at the gateway")]
async fn complete_payment(world: &mut OrderWorld) {
    let intent = world.intent.as_ref().expect("No payment intent");
    let capture = world.system().gateway.pay(&intent.intent_id);
    world.capture = Some(capture);
}

#[when("the capture signature is tampered with")]
async fn tamper(world: &mut OrderWorld) {
    let capture = world.capture.as_mut().expect("No capture");
    capture.signature = capture.signature.replace(|c: char| c.is_ascii_digit(), "0");
}

#[when(expr = "customer '{word}' submits the capture for {int} {word}")]
async fn submit_capture(world: &mut OrderWorld, user: String, qty: i64, product: String) {
    let capture = world.capture.clone().expect("No capture");
    let request = CaptureRequest {
        intent_id: capture.intent_id,
        capture_id: capture.capture_id,
        signature: capture.signature,
        order: draft_for(&product, qty).with_payment_method(PaymentMethod::Online),
    };
    let result = world.system().payments.capture(&Principal::customer(&user), request).await;
    world.record(result.map(|r| r.into_order()));
}

#[when(expr = "customer '{word}' asks to cancel the order because {string}")]
async fn request_cancellation(world: &mut OrderWorld, user: String, reason: String) {
    let id = world.order().id.clone();
    let request = CancellationRequest::new(reason, String::default());
    let result = world.system().cancellations.request_cancellation(&Principal::customer(&user), &id, request).await;
    world.record(result);
}

async fn adjudicate(world: &mut OrderWorld, adjudication: Adjudication) -> Option<RefundOutcome> {
    let id = world.order().id.clone();
    let result = world.system().cancellations.adjudicate(&admin(), &id, adjudication).await;
    match result {
        Ok(outcome) => {
            world.record(Ok(outcome.order));
            Some(outcome.refund)
        },
        Err(e) => {
            world.last_error = Some(e);
            None
        },
    }
}

#[when("the admin approves the cancellation with an immediate refund")]
async fn approve_with_refund(world: &mut OrderWorld) {
    adjudicate(world, Adjudication::approve(true)).await;
}

#[when("the admin approves the cancellation")]
async fn approve(world: &mut OrderWorld) {
    adjudicate(world, Adjudication::approve(false)).await;
}

#[when("the admin rejects the cancellation")]
async fn reject(world: &mut OrderWorld) {
    adjudicate(world, Adjudication::reject()).await;
}

#[when("the admin retries the refund")]
async fn retry_refund(world: &mut OrderWorld) {
    let id = world.order().id.clone();
    let result = world.system().cancellations.retry_refund(&admin(), &id).await;
    world.record(result);
}

#[when("the refund worker runs")]
async fn refund_worker(world: &mut OrderWorld) {
    world.system().cancellations.retry_pending_refunds().await.expect("Refund sweep failed");
}

#[then(expr = "the order status is {string}")]
async fn check_status(world: &mut OrderWorld, status: String) {
    let order = reload(world).await;
    assert_eq!(order.status.as_str(), status);
}

#[then(expr = "the payment status is {word}")]
async fn check_payment_status(world: &mut OrderWorld, status: String) {
    let expected = PaymentStatus::from_str(&status).expect("Invalid payment status");
    let order = reload(world).await;
    assert_eq!(order.payment_status, expected);
}

#[then(expr = "the order total is {word}")]
async fn check_total(world: &mut OrderWorld, total: String) {
    let expected = Money::from_str(&total).expect("Invalid amount");
    assert_eq!(world.order().total_price, expected);
}

#[then(expr = "the order has {int} tracking events")]
async fn check_tracking_len(world: &mut OrderWorld, count: usize) {
    let order = reload(world).await;
    assert_eq!(order.tracking.len(), count);
}

#[then(expr = "the last tracking message is {string}")]
async fn check_last_message(world: &mut OrderWorld, message: String) {
    let order = reload(world).await;
    assert_eq!(order.tracking.last().map(|e| e.message.as_str()), Some(message.as_str()));
}

#[then(expr = "the order is marked as delivered")]
async fn check_delivered(world: &mut OrderWorld) {
    let order = reload(world).await;
    assert!(order.is_delivered);
    assert!(order.delivered_at.is_some());
}

#[then(expr = "the order is not marked as delivered")]
async fn check_not_delivered(world: &mut OrderWorld) {
    let order = reload(world).await;
    assert!(!order.is_delivered);
    assert!(order.delivered_at.is_none());
}

#[then(expr = "the cancellation result is {word}")]
async fn check_cancellation_result(world: &mut OrderWorld, result: String) {
    let order = reload(world).await;
    let record = order.cancellation.as_ref().expect("No cancellation record");
    let expected = match result.as_str() {
        "Cancelled" => CancellationResult::Cancelled,
        "Rejected" => CancellationResult::Rejected,
        _ => CancellationResult::None,
    };
    assert_eq!(record.result(), expected);
}

#[then(expr = "the refund has been initiated")]
async fn check_refund_initiated(world: &mut OrderWorld) {
    let order = reload(world).await;
    assert!(order.cancellation.as_ref().map(|c| c.refund_initiated).unwrap_or(false));
}

#[then(expr = "the refund has not been initiated after {int} attempt(s)")]
async fn check_refund_pending(world: &mut OrderWorld, attempts: i64) {
    let order = reload(world).await;
    let record = order.cancellation.as_ref().expect("No cancellation record");
    assert!(!record.refund_initiated);
    assert_eq!(record.refund_attempts, attempts);
    assert!(record.last_refund_error.is_some());
}

#[then(expr = "the request fails with {word}")]
async fn check_error(world: &mut OrderWorld, kind: String) {
    let err = world.last_error.as_ref().expect("The last request succeeded");
    assert_eq!(error_kind(err), kind, "Unexpected error: {err}");
}

#[then(expr = "there are {int} orders in the system")]
async fn check_order_count(world: &mut OrderWorld, count: usize) {
    let orders = world.system().db.fetch_all_orders().await.expect("Error fetching orders");
    assert_eq!(orders.len(), count);
}

#[then(expr = "the gateway received {int} refund request(s)")]
async fn check_refund_calls(world: &mut OrderWorld, count: u64) {
    assert_eq!(world.system().gateway.refund_calls(), count);
}

async fn reload(world: &mut OrderWorld) -> order_payment_engine::db_types::Order {
    let id = world.order().id.clone();
    let order = world.system().db.fetch_order_by_id(&id).await.expect("Error fetching order").expect("Order is gone");
    world.order = Some(order.clone());
    order
}

#[then(expr = "the order can no longer be cancelled")]
async fn check_not_cancellable(world: &mut OrderWorld) {
    let order = reload(world).await;
    assert!(order.status.is_dispatched() || order.status == OrderStatus::Returned);
}
