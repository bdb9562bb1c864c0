use actix_web::{
    cookie::Cookie,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::Duration;
use order_payment_engine::{db_types::Role, events::EventProducers, OrderFlowApi};

use super::{
    helpers::{get, get_auth_config, issue_token, sample_order, send_request},
    mocks::MockOrderStore,
};
use crate::{
    auth::{JwtClaims, TokenIssuer, TOKEN_COOKIE},
    config::AuthConfig,
    routes::{health, MyOrdersRoute},
};

fn configure(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_fetch_orders_for_user().returning(|user_id| Ok(vec![sample_order("order-1", user_id)]));
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.service(health).service(MyOrdersRoute::<MockOrderStore>::new()).app_data(web::Data::new(api));
}

#[actix_web::test]
async fn health_needs_no_token() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(get("/health", ""), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn requests_without_a_token_are_refused() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(get("/orders/mine", ""), configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. No access token was provided."}"#);
}

#[actix_web::test]
async fn tampered_tokens_are_refused() {
    let _ = env_logger::try_init().ok();
    let mut token = issue_token("alice", Role::Customer);
    token.replace_range(token.len() - 10..token.len() - 5, "AAAAA");
    let (status, _) = send_request(get("/orders/mine", &token), configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn expired_tokens_are_refused() {
    let _ = env_logger::try_init().ok();
    let claims = JwtClaims::new("alice", Role::Customer, Duration::hours(-2));
    let token = TokenIssuer::new(&get_auth_config()).issue_token(&claims).unwrap();
    let (status, _) = send_request(get("/orders/mine", &token), configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn tokens_signed_with_another_secret_are_refused() {
    let _ = env_logger::try_init().ok();
    let other = AuthConfig::new("not-the-secret-this-server-uses-at-all").unwrap();
    let claims = JwtClaims::new("alice", Role::Admin, Duration::hours(1));
    let token = TokenIssuer::new(&other).issue_token(&claims).unwrap();
    let (status, _) = send_request(get("/orders/mine", &token), configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn token_cookie_is_accepted() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("alice", Role::Customer);
    let req = TestRequest::get().uri("/orders/mine").cookie(Cookie::new(TOKEN_COOKIE, token));
    let (status, body) = send_request(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""user_id":"alice""#));
}

#[actix_web::test]
async fn no_validator_means_no_access() {
    let _ = env_logger::try_init().ok();
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    let req = get("/orders/mine", &issue_token("alice", Role::Customer)).to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
