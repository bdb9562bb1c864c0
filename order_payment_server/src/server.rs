use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use order_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    CancellationApi,
    OrderFlowApi,
    PaymentFlowApi,
    SqliteDatabase,
};

use crate::{
    auth::TokenValidator,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::razorpay::RazorpayGateway,
    refund_worker::start_refund_worker,
    routes::{
        health,
        AllOrdersRoute,
        CreateOrderRoute,
        HandleCancellationRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        OrderTrackingRoute,
        PaymentCaptureRoute,
        PaymentIntentRoute,
        RequestCancellationRoute,
        RetryRefundRoute,
        UpdateTrackingRoute,
    },
};

pub const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway =
        RazorpayGateway::new(config.razorpay.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, order_event_log_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if let Some(interval) = config.refund_retry_interval {
        let _handle =
            start_refund_worker(db.clone(), gateway.clone(), producers.clone(), config.flow_options(), interval);
    }
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: RazorpayGateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let validator = web::Data::new(TokenValidator::new(&config.auth));
    let options = ServerOptions::from_config(&config);
    let flow_options = config.flow_options();
    let signing_secret = config.razorpay.key_secret.clone();
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone()).with_options(flow_options.clone());
        let payments_api = PaymentFlowApi::new(db.clone(), gateway.clone(), signing_secret.clone(), producers.clone())
            .with_options(flow_options.clone());
        let cancellations_api =
            CancellationApi::new(db.clone(), gateway.clone(), producers.clone()).with_options(flow_options.clone());
        let api_scope = web::scope("/api")
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(AllOrdersRoute::<SqliteDatabase>::new())
            .service(PaymentIntentRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(PaymentCaptureRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(OrderTrackingRoute::<SqliteDatabase>::new())
            .service(UpdateTrackingRoute::<SqliteDatabase>::new())
            .service(RequestCancellationRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(HandleCancellationRoute::<SqliteDatabase, RazorpayGateway>::new())
            .service(RetryRefundRoute::<SqliteDatabase, RazorpayGateway>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("opg::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(cancellations_api))
            .app_data(validator.clone())
            .app_data(web::Data::new(options))
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Writes every order lifecycle event to the `opg::events` log target, which gives operators an audit trail
/// independent of the access log.
pub fn order_event_log_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_created(|ev| {
            Box::pin(async move {
                let o = &ev.order;
                info!(target: "opg::events", "📬️ Order {} created for {} ({}, {})", o.id, o.user_id, o.payment_method, o.total_price);
            })
        })
        .on_status_changed(|ev| {
            Box::pin(async move {
                info!(target: "opg::events", "📬️ Order {} moved from {} to {}", ev.order.id, ev.old_status, ev.new_status());
            })
        })
        .on_refund(|ev| {
            Box::pin(async move {
                info!(target: "opg::events", "📬️ Refund for order {}: {:?}", ev.order.id, ev.outcome);
            })
        });
    hooks
}
