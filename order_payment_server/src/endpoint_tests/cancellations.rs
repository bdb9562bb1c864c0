use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::Utc;
use order_payment_engine::{
    db_types::{CancellationState, Order, OrderStatus, PaymentStatus, Role},
    events::{EventProducers, RefundOutcome},
    order_objects::{Adjudication, AdjudicationAction, AdjudicationOutcome, CancellationRequest},
    state_machine,
    test_utils::mock_gateway::MockGateway,
    CancellationApi,
};
use serde_json::json;

use super::{
    helpers::{issue_token, post, put, sample_online_order, sample_order, send_request, single_order_store, with_token},
    mocks::MockOrderStore,
};
use crate::routes::{HandleCancellationRoute, RequestCancellationRoute, RetryRefundRoute};

fn configure(store: MockOrderStore, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = CancellationApi::new(store, gateway, EventProducers::default());
        cfg.service(RequestCancellationRoute::<MockOrderStore, MockGateway>::new())
            .service(HandleCancellationRoute::<MockOrderStore, MockGateway>::new())
            .service(RetryRefundRoute::<MockOrderStore, MockGateway>::new())
            .app_data(web::Data::new(api));
    }
}

/// An online order for bob with an open cancellation request.
fn online_order_awaiting_decision() -> Order {
    let mut order = sample_online_order("order-1", "bob", "order_1", "pay_1");
    state_machine::request_cancellation(&mut order, "Ordered by mistake", "", Utc::now()).unwrap();
    order
}

#[actix_web::test]
async fn owner_requests_cancellation() {
    let _ = env_logger::try_init().ok();
    let (store, current) = single_order_store(sample_order("order-1", "bob"));
    let token = issue_token("bob", Role::Customer);
    let request = CancellationRequest::new("Found it cheaper", "Please cancel");
    let (status, body) =
        send_request(post("/orders/order-1/cancel", &token, &request), configure(store, MockGateway::new())).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatus::ReturnRequested);
    let record = order.cancellation.unwrap();
    assert_eq!(record.state, CancellationState::Requested);
    assert_eq!(record.reason, "Found it cheaper");
    assert_eq!(record.contact, "9876543210");
    assert_eq!(record.previous_status, OrderStatus::Ordered);
    assert_eq!(current.lock().unwrap().status, OrderStatus::ReturnRequested);
}

#[actix_web::test]
async fn cancellation_body_is_optional() {
    let _ = env_logger::try_init().ok();
    let (store, _) = single_order_store(sample_order("order-1", "bob"));
    let token = issue_token("bob", Role::Customer);
    let req = with_token(TestRequest::post().uri("/orders/order-1/cancel"), &token);
    let (status, body) = send_request(req, configure(store, MockGateway::new())).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.tracking.last().unwrap().message, "Cancellation requested by user: No reason provided");
}

#[actix_web::test]
async fn duplicate_requests_conflict() {
    let _ = env_logger::try_init().ok();
    let (store, _) = single_order_store(online_order_awaiting_decision());
    let token = issue_token("bob", Role::Customer);
    let (status, body) =
        send_request(post("/orders/order-1/cancel", &token, &json!({})), configure(store, MockGateway::new())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, r#"{"error":"A cancellation has already been requested for this order"}"#);
}

#[actix_web::test]
async fn other_customers_cannot_cancel() {
    let _ = env_logger::try_init().ok();
    let (store, current) = single_order_store(sample_order("order-1", "bob"));
    let token = issue_token("alice", Role::Customer);
    let (status, _) =
        send_request(post("/orders/order-1/cancel", &token, &json!({})), configure(store, MockGateway::new())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(current.lock().unwrap().cancellation.is_none());
}

#[actix_web::test]
async fn shipped_orders_cannot_be_cancelled() {
    let _ = env_logger::try_init().ok();
    let mut order = sample_order("order-1", "bob");
    order.status = OrderStatus::Shipped;
    let (store, _) = single_order_store(order);
    let token = issue_token("bob", Role::Customer);
    let (status, _) =
        send_request(post("/orders/order-1/cancel", &token, &json!({})), configure(store, MockGateway::new())).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn only_admins_decide() {
    let _ = env_logger::try_init().ok();
    let (store, current) = single_order_store(online_order_awaiting_decision());
    let token = issue_token("bob", Role::Customer);
    let (status, _) = send_request(
        put("/orders/order-1/cancel/handle", &token, &Adjudication::approve(true)),
        configure(store, MockGateway::new()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(current.lock().unwrap().status, OrderStatus::ReturnRequested);
}

#[actix_web::test]
async fn approval_with_refund() {
    let _ = env_logger::try_init().ok();
    let (store, current) = single_order_store(online_order_awaiting_decision());
    let gateway = MockGateway::new();
    let token = issue_token("admin", Role::Admin);
    let (status, body) = send_request(
        put("/orders/order-1/cancel/handle", &token, &json!({"action": "approve", "refundNow": true})),
        configure(store, gateway.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let outcome: AdjudicationOutcome = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome.action, AdjudicationAction::Approve);
    assert!(outcome.refund.is_initiated());
    assert_eq!(outcome.order.status, OrderStatus::Returned);
    assert_eq!(outcome.order.payment_status, PaymentStatus::Refunded);
    assert_eq!(gateway.refund_calls(), 1);
    let stored = current.lock().unwrap().clone();
    assert!(stored.cancellation.unwrap().refund_initiated);
}

#[actix_web::test]
async fn failed_refunds_do_not_undo_the_approval() {
    let _ = env_logger::try_init().ok();
    let (store, current) = single_order_store(online_order_awaiting_decision());
    let gateway = MockGateway::new();
    gateway.fail_refunds(true);
    let token = issue_token("admin", Role::Admin);
    let (status, body) = send_request(
        put("/orders/order-1/cancel/handle", &token, &Adjudication::approve(true)),
        configure(store, gateway.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let outcome: AdjudicationOutcome = serde_json::from_str(&body).unwrap();
    assert!(matches!(outcome.refund, RefundOutcome::Failed { .. }));
    assert_eq!(outcome.order.status, OrderStatus::Returned);
    let stored = current.lock().unwrap().clone();
    let record = stored.cancellation.unwrap();
    assert_eq!(record.state, CancellationState::Approved);
    assert!(!record.refund_initiated);
    assert_eq!(record.refund_attempts, 1);
    assert!(record.last_refund_error.is_some());
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
}

#[actix_web::test]
async fn rejection_restores_the_order() {
    let _ = env_logger::try_init().ok();
    let (store, _) = single_order_store(online_order_awaiting_decision());
    let gateway = MockGateway::new();
    let token = issue_token("admin", Role::Admin);
    let (status, body) = send_request(
        put("/orders/order-1/cancel/handle", &token, &Adjudication::reject()),
        configure(store, gateway.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let outcome: AdjudicationOutcome = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome.refund, RefundOutcome::NotAttempted);
    assert_eq!(outcome.order.status, OrderStatus::Ordered);
    assert_eq!(outcome.order.cancellation.unwrap().state, CancellationState::Rejected);
    assert_eq!(gateway.refund_calls(), 0);
}

#[actix_web::test]
async fn retry_a_failed_refund() {
    let _ = env_logger::try_init().ok();
    let mut order = online_order_awaiting_decision();
    state_machine::adjudicate(&mut order, state_machine::Decision::Approve, "admin", Utc::now()).unwrap();
    let (store, current) = single_order_store(order);
    let gateway = MockGateway::new();
    gateway.fail_refunds(true);
    let token = issue_token("admin", Role::Admin);
    let (status, _) = send_request(
        post("/orders/order-1/refund/retry", &token, &json!({})),
        configure(store, gateway.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(current.lock().unwrap().cancellation.as_ref().unwrap().refund_attempts, 1);

    gateway.fail_refunds(false);
    let (store, current) = single_order_store(current.lock().unwrap().clone());
    let (status, body) =
        send_request(post("/orders/order-1/refund/retry", &token, &json!({})), configure(store, gateway.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Refunded);
    let record = current.lock().unwrap().cancellation.clone().unwrap();
    assert!(record.refund_initiated);
    assert_eq!(record.refund_attempts, 2);
    assert_eq!(gateway.refund_calls(), 2);
}

#[actix_web::test]
async fn cod_orders_have_nothing_to_refund() {
    let _ = env_logger::try_init().ok();
    let mut order = sample_order("order-1", "bob");
    state_machine::request_cancellation(&mut order, "Changed my mind", "", Utc::now()).unwrap();
    state_machine::adjudicate(&mut order, state_machine::Decision::Approve, "admin", Utc::now()).unwrap();
    let (store, _) = single_order_store(order);
    let gateway = MockGateway::new();
    let token = issue_token("admin", Role::Admin);
    let (status, _) =
        send_request(post("/orders/order-1/refund/retry", &token, &json!({})), configure(store, gateway.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(gateway.refund_calls(), 0);
}
