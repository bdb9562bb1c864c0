use actix_web::{http::StatusCode, web, web::ServiceConfig};
use opg_common::Money;
use order_payment_engine::{
    db_types::{Order, OrderStatus, PaymentMethod, PaymentStatus, Role},
    events::EventProducers,
    order_objects::{TrackingUpdateRequest, TrackingView},
    test_utils::fixtures::draft_for,
    OrderFlowApi,
};
use serde_json::json;

use super::{
    helpers::{get, inserting_store, issue_token, post, sample_order, send_request, single_order_store},
    mocks::MockOrderStore,
};
use crate::routes::{AllOrdersRoute, CreateOrderRoute, MyOrdersRoute, OrderByIdRoute, OrderTrackingRoute, UpdateTrackingRoute};

fn configure(store: MockOrderStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = OrderFlowApi::new(store, EventProducers::default());
        cfg.service(CreateOrderRoute::<MockOrderStore>::new())
            .service(AllOrdersRoute::<MockOrderStore>::new())
            .service(MyOrdersRoute::<MockOrderStore>::new())
            .service(OrderByIdRoute::<MockOrderStore>::new())
            .service(OrderTrackingRoute::<MockOrderStore>::new())
            .service(UpdateTrackingRoute::<MockOrderStore>::new())
            .app_data(web::Data::new(api));
    }
}

#[actix_web::test]
async fn create_cod_order() {
    let _ = env_logger::try_init().ok();
    let store = inserting_store("order-1").with_sample_catalog();
    let token = issue_token("alice", Role::Customer);
    // The client's prices are ignored in favour of the catalog
    let draft = draft_for("lamp", 2).with_total_price(Money::from_major(1));
    let (status, body) = send_request(post("/orders", &token, &draft), configure(store)).await;
    assert_eq!(status, StatusCode::CREATED);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.user_id, "alice");
    assert_eq!(order.total_price, Money::from_major(2000));
    assert_eq!(order.payment_method, PaymentMethod::Cod);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.status, OrderStatus::Ordered);
}

#[actix_web::test]
async fn online_orders_cannot_skip_payment() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new().with_sample_catalog();
    store.expect_insert_order().never();
    let token = issue_token("alice", Role::Customer);
    let draft = draft_for("lamp", 1).with_payment_method(PaymentMethod::Online);
    let (status, body) = send_request(post("/orders", &token, &draft), configure(store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Use the online payment flow for online payments"}"#);
}

#[actix_web::test]
async fn unknown_products_are_rejected() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new().with_sample_catalog();
    store.expect_insert_order().never();
    let token = issue_token("alice", Role::Customer);
    let (status, body) = send_request(post("/orders", &token, &draft_for("sofa", 1)), configure(store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Product sofa does not exist"}"#);
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store.expect_fetch_orders_for_user().times(1).returning(|user_id| {
        assert_eq!(user_id.to_string(), "alice");
        Ok(vec![sample_order("order-2", "alice"), sample_order("order-1", "alice")])
    });
    // "/orders/mine" must never be read as an order id
    store.expect_fetch_order_by_id().never();
    let token = issue_token("alice", Role::Customer);
    let (status, body) = send_request(get("/orders/mine", &token), configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id.as_str(), "order-2");
}

#[actix_web::test]
async fn only_admins_list_all_orders() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store.expect_fetch_all_orders().never();
    let token = issue_token("alice", Role::Customer);
    let (status, _) = send_request(get("/orders", &token), configure(store)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut store = MockOrderStore::new();
    store.expect_fetch_all_orders().times(1).returning(|| Ok(vec![sample_order("order-1", "bob")]));
    let token = issue_token("admin", Role::Admin);
    let (status, body) = send_request(get("/orders", &token), configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders[0].user_id, "bob");
}

#[actix_web::test]
async fn customers_only_see_their_own_orders() {
    let _ = env_logger::try_init().ok();
    let (store, _) = single_order_store(sample_order("order-1", "bob"));
    let token = issue_token("alice", Role::Customer);
    let (status, _) = send_request(get("/orders/order-1", &token), configure(store)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (store, _) = single_order_store(sample_order("order-1", "bob"));
    let token = issue_token("bob", Role::Customer);
    let (status, body) = send_request(get("/orders/order-1", &token), configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.id.as_str(), "order-1");

    let (store, _) = single_order_store(sample_order("order-1", "bob"));
    let token = issue_token("admin", Role::Admin);
    let (status, _) = send_request(get("/orders/order-1", &token), configure(store)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn missing_orders_are_not_found() {
    let _ = env_logger::try_init().ok();
    let (store, _) = single_order_store(sample_order("order-1", "bob"));
    let token = issue_token("bob", Role::Customer);
    let (status, body) = send_request(get("/orders/order-404", &token), configure(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r##"{"error":"Order #order-404 not found"}"##);
}

#[actix_web::test]
async fn fetch_tracking() {
    let _ = env_logger::try_init().ok();
    let (store, _) = single_order_store(sample_order("order-1", "bob"));
    let token = issue_token("bob", Role::Customer);
    let (status, body) = send_request(get("/orders/order-1/tracking", &token), configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    let view: TrackingView = serde_json::from_str(&body).unwrap();
    assert_eq!(view.status, OrderStatus::Ordered);
    assert_eq!(view.tracking.len(), 1);
}

#[actix_web::test]
async fn admins_move_orders_along() {
    let _ = env_logger::try_init().ok();
    let (store, current) = single_order_store(sample_order("order-1", "bob"));
    let token = issue_token("admin", Role::Admin);
    let update = json!({"status": "Packed", "message": "Packed at the Pune warehouse", "location": "Pune"});
    let (status, body) = send_request(post("/orders/order-1/track", &token, &update), configure(store)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatus::Packed);
    assert_eq!(order.tracking.len(), 2);
    assert_eq!(order.tracking[1].location, "Pune");
    assert_eq!(order.tracking[1].metadata, json!({}));
    assert_eq!(current.lock().unwrap().version, 2);
}

#[actix_web::test]
async fn customers_cannot_update_tracking() {
    let _ = env_logger::try_init().ok();
    let (store, current) = single_order_store(sample_order("order-1", "bob"));
    let token = issue_token("bob", Role::Customer);
    let update = TrackingUpdateRequest::new("Delivered");
    let (status, _) = send_request(post("/orders/order-1/track", &token, &update), configure(store)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(current.lock().unwrap().status, OrderStatus::Ordered);
}

#[actix_web::test]
async fn tracking_updates_are_validated() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("admin", Role::Admin);
    let (store, _) = single_order_store(sample_order("order-1", "bob"));
    let update = TrackingUpdateRequest::new("Teleported");
    let (status, _) = send_request(post("/orders/order-1/track", &token, &update), configure(store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Return decisions belong to the cancellation workflow
    let (store, _) = single_order_store(sample_order("order-1", "bob"));
    let update = TrackingUpdateRequest::new("Return Approved");
    let (status, _) = send_request(post("/orders/order-1/track", &token, &update), configure(store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Refunded is only allowed on returned orders
    let (store, _) = single_order_store(sample_order("order-1", "bob"));
    let update = TrackingUpdateRequest::new("Refunded");
    let (status, _) = send_request(post("/orders/order-1/track", &token, &update), configure(store)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
