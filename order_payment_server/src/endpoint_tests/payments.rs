use actix_web::{http::StatusCode, web, web::ServiceConfig};
use opg_common::{Money, Secret};
use order_payment_engine::{
    db_types::{Order, PaymentMethod, PaymentStatus, Role},
    events::EventProducers,
    order_objects::{CaptureRequest, IntentResponse},
    test_utils::{
        fixtures::draft_for,
        mock_gateway::{MockGateway, MOCK_KEY_ID, MOCK_KEY_SECRET},
    },
    traits::PaymentGateway,
    PaymentFlowApi,
};
use serde_json::json;

use super::{
    helpers::{inserting_store, issue_token, post, sample_online_order, send_request},
    mocks::MockOrderStore,
};
use crate::routes::{PaymentCaptureRoute, PaymentIntentRoute};

fn configure(store: MockOrderStore, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api =
            PaymentFlowApi::new(store, gateway, Secret::new(MOCK_KEY_SECRET.to_string()), EventProducers::default());
        cfg.service(PaymentIntentRoute::<MockOrderStore, MockGateway>::new())
            .service(PaymentCaptureRoute::<MockOrderStore, MockGateway>::new())
            .app_data(web::Data::new(api));
    }
}

/// Opens an intent for a single vase (499.50) and pays it.
async fn paid_vase_capture(gateway: &MockGateway) -> CaptureRequest {
    let intent = gateway.create_intent(Money::from_minor(49_950), "INR", "rcpt_test").await.unwrap();
    let paid = gateway.pay(&intent.intent_id);
    CaptureRequest {
        intent_id: paid.intent_id,
        capture_id: paid.capture_id,
        signature: paid.signature,
        order: draft_for("vase", 1),
    }
}

#[actix_web::test]
async fn create_payment_intent() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("alice", Role::Customer);
    let body = json!({"amount": "499.50"});
    let (status, body) =
        send_request(post("/orders/payment/intent", &token, &body), configure(MockOrderStore::new(), MockGateway::new()))
            .await;
    assert_eq!(status, StatusCode::OK);
    let intent: IntentResponse = serde_json::from_str(&body).unwrap();
    assert!(intent.intent_id.starts_with("order_"));
    assert_eq!(intent.amount, Money::from_minor(49_950));
    assert_eq!(intent.currency, "INR");
    assert_eq!(intent.key_id, MOCK_KEY_ID);
}

#[actix_web::test]
async fn intents_need_a_positive_amount() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("alice", Role::Customer);
    let body = json!({"amount": 0});
    let (status, body) =
        send_request(post("/orders/payment/intent", &token, &body), configure(MockOrderStore::new(), MockGateway::new()))
            .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Amount missing or invalid"}"#);
}

#[actix_web::test]
async fn gateway_outages_are_reported() {
    let _ = env_logger::try_init().ok();
    let gateway = MockGateway::new();
    gateway.set_unavailable(true);
    let token = issue_token("alice", Role::Customer);
    let body = json!({"amount": 100});
    let (status, _) =
        send_request(post("/orders/payment/intent", &token, &body), configure(MockOrderStore::new(), gateway)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn verified_capture_creates_a_paid_order() {
    let _ = env_logger::try_init().ok();
    let gateway = MockGateway::new();
    let capture = paid_vase_capture(&gateway).await;
    let mut store = inserting_store("order-7").with_sample_catalog();
    store.expect_fetch_order_by_capture().returning(|_, _| Ok(None));
    let token = issue_token("alice", Role::Customer);
    let (status, body) =
        send_request(post("/orders/payment/capture", &token, &capture), configure(store, gateway)).await;
    assert_eq!(status, StatusCode::CREATED);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.id.as_str(), "order-7");
    assert_eq!(order.payment_method, PaymentMethod::Online);
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.total_price, Money::from_minor(49_950));
    assert!(order.paid_at.is_some());
    assert_eq!(order.payment_info.unwrap().capture_id, capture.capture_id);
}

#[actix_web::test]
async fn replayed_capture_returns_the_existing_order() {
    let _ = env_logger::try_init().ok();
    let gateway = MockGateway::new();
    let capture = paid_vase_capture(&gateway).await;
    let existing = sample_online_order("order-7", "alice", &capture.intent_id, &capture.capture_id);
    let mut store = MockOrderStore::new();
    store.expect_fetch_order_by_capture().returning(move |_, _| Ok(Some(existing.clone())));
    store.expect_insert_order().never();
    let token = issue_token("alice", Role::Customer);
    let (status, body) =
        send_request(post("/orders/payment/capture", &token, &capture), configure(store, gateway)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.id.as_str(), "order-7");
}

#[actix_web::test]
async fn captures_belong_to_one_customer() {
    let _ = env_logger::try_init().ok();
    let gateway = MockGateway::new();
    let capture = paid_vase_capture(&gateway).await;
    let existing = sample_online_order("order-7", "alice", &capture.intent_id, &capture.capture_id);
    let mut store = MockOrderStore::new();
    store.expect_fetch_order_by_capture().returning(move |_, _| Ok(Some(existing.clone())));
    let token = issue_token("mallory", Role::Customer);
    let (status, _) = send_request(post("/orders/payment/capture", &token, &capture), configure(store, gateway)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn tampered_signatures_are_refused() {
    let _ = env_logger::try_init().ok();
    let gateway = MockGateway::new();
    let mut capture = paid_vase_capture(&gateway).await;
    capture.capture_id = "pay_someone_else".into();
    let mut store = MockOrderStore::new();
    store.expect_fetch_order_by_capture().never();
    store.expect_insert_order().never();
    let token = issue_token("alice", Role::Customer);
    let (status, body) =
        send_request(post("/orders/payment/capture", &token, &capture), configure(store, gateway)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid payment signature"}"#);
}

#[actix_web::test]
async fn mismatched_captures_are_refunded_and_create_nothing() {
    let _ = env_logger::try_init().ok();
    let gateway = MockGateway::new();
    let mut capture = paid_vase_capture(&gateway).await;
    // The intent was for one vase, but the order asks for two
    capture.order = draft_for("vase", 2);
    let mut store = MockOrderStore::new().with_sample_catalog();
    store.expect_fetch_order_by_capture().returning(|_, _| Ok(None));
    store.expect_insert_order().never();
    let token = issue_token("alice", Role::Customer);
    let (status, body) =
        send_request(post("/orders/payment/capture", &token, &capture), configure(store, gateway.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let refund = gateway.refunds().pop().expect("the capture should have been refunded");
    assert_eq!(refund.amount, Money::from_minor(49_950));
    let expected = format!(
        r#"{{"error":"The captured amount (499.50) does not match the order total (999.00). The payment has been refunded ({})."}}"#,
        refund.refund_id
    );
    assert_eq!(body, expected);
}
