use std::sync::{Arc, Mutex};

use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::{Duration, TimeZone, Utc};
use log::debug;
use opg_common::Money;
use order_payment_engine::{
    db_types::{
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentInfo,
        PaymentMethod,
        PaymentStatus,
        Role,
        TrackingEvent,
        TrackingStatus,
    },
    test_utils::fixtures::sample_address,
    traits::InsertOrderResult,
};
use serde::Serialize;

use super::mocks::MockOrderStore;
use crate::{
    auth::{JwtClaims, TokenIssuer, TokenValidator},
    config::{AuthConfig, ServerOptions},
};

// A test-only secret. DO NOT re-use it anywhere.
const TEST_JWT_SECRET: &str = "endpoint-tests-only-9c1b7e2f04d3a8b6";

pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new(TEST_JWT_SECRET).expect("Invalid test secret")
}

pub fn issue_token(sub: &str, role: Role) -> String {
    let claims = JwtClaims::new(sub, role, Duration::hours(1));
    TokenIssuer::new(&get_auth_config()).issue_token(&claims).expect("Failed to sign token")
}

pub fn with_token(req: TestRequest, token: &str) -> TestRequest {
    if token.is_empty() {
        req
    } else {
        req.insert_header(("Authorization", format!("Bearer {token}")))
    }
}

pub fn get(path: &str, token: &str) -> TestRequest {
    with_token(TestRequest::get().uri(path), token)
}

pub fn post<T: Serialize>(path: &str, token: &str, body: &T) -> TestRequest {
    with_token(TestRequest::post().uri(path).set_json(body), token)
}

pub fn put<T: Serialize>(path: &str, token: &str, body: &T) -> TestRequest {
    with_token(TestRequest::put().uri(path).set_json(body), token)
}

/// Runs a single request against an app containing the routes and API objects registered by `configure`.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new()
        .app_data(web::Data::new(TokenValidator::new(&get_auth_config())))
        .app_data(web::Data::new(ServerOptions::default()))
        .configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = res.into_body().try_into_bytes().map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
    (status, body)
}

/// A cash-on-delivery order for two lamps, placed by `user_id`.
pub fn sample_order(id: &str, user_id: &str) -> Order {
    let created_at = Utc.with_ymd_and_hms(2024, 5, 14, 10, 30, 0).unwrap();
    let items_price = Money::from_major(2000);
    Order {
        id: OrderId::from(id.to_string()),
        user_id: user_id.to_string(),
        items: vec![OrderItem {
            product_id: "lamp".into(),
            name: "Brass Table Lamp".into(),
            price: Money::from_major(1000),
            qty: 2,
            image: Some("/images/lamp.jpg".into()),
            selected_size: None,
        }],
        shipping_address: sample_address(),
        payment_method: PaymentMethod::Cod,
        payment_status: PaymentStatus::Pending,
        payment_info: None,
        status: OrderStatus::Ordered,
        tracking: vec![TrackingEvent::new(TrackingStatus::Ordered, "Order placed with Cash on Delivery", created_at)],
        cancellation: None,
        items_price,
        shipping_price: Money::default(),
        tax_price: Money::default(),
        total_price: items_price,
        is_delivered: false,
        delivered_at: None,
        paid_at: None,
        created_at,
        updated_at: created_at,
        version: 1,
    }
}

/// The same order, paid online with the given gateway references.
pub fn sample_online_order(id: &str, user_id: &str, intent_id: &str, capture_id: &str) -> Order {
    let mut order = sample_order(id, user_id);
    order.payment_method = PaymentMethod::Online;
    order.payment_status = PaymentStatus::Paid;
    order.payment_info =
        Some(PaymentInfo { intent_id: intent_id.into(), capture_id: capture_id.into(), signature: "sig".into() });
    order.paid_at = Some(order.created_at);
    order
}

/// What a store would return after inserting `new_order`.
pub fn stored_order(id: &str, new_order: NewOrder) -> Order {
    Order {
        id: OrderId::from(id.to_string()),
        user_id: new_order.user_id,
        items: new_order.items,
        shipping_address: new_order.shipping_address,
        payment_method: new_order.payment_method,
        payment_status: new_order.payment_status,
        payment_info: new_order.payment_info,
        status: OrderStatus::Ordered,
        tracking: vec![TrackingEvent::new(TrackingStatus::Ordered, new_order.initial_message, new_order.created_at)],
        cancellation: None,
        items_price: new_order.items_price,
        shipping_price: new_order.shipping_price,
        tax_price: new_order.tax_price,
        total_price: new_order.total_price,
        is_delivered: false,
        delivered_at: None,
        paid_at: new_order.paid_at,
        created_at: new_order.created_at,
        updated_at: new_order.created_at,
        version: 1,
    }
}

/// A store holding a single order. Saves overwrite it and bump the version, and fetches return the latest copy.
pub fn single_order_store(order: Order) -> (MockOrderStore, Arc<Mutex<Order>>) {
    let current = Arc::new(Mutex::new(order));
    let mut store = MockOrderStore::new();
    let fetched = Arc::clone(&current);
    store.expect_fetch_order_by_id().returning(move |id| {
        let order = fetched.lock().unwrap().clone();
        Ok((&order.id == id).then_some(order))
    });
    let saved = Arc::clone(&current);
    store.expect_save_order().returning(move |order| {
        let mut stored = saved.lock().unwrap();
        let mut order = order.clone();
        order.version += 1;
        *stored = order.clone();
        Ok(order)
    });
    (store, current)
}

/// A store that accepts every insert as a new order with the given id.
pub fn inserting_store(id: &'static str) -> MockOrderStore {
    let mut store = MockOrderStore::new();
    store.expect_insert_order().returning(move |new_order| Ok(InsertOrderResult::Inserted(stored_order(id, new_order))));
    store
}
