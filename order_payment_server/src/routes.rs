//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (e.g. I/O, database operations,
//! gateway calls) is expressed as a future so that the worker can keep serving other requests while it waits.
//!
//! Authorization is not decided here. Every handler extracts the caller's [`JwtClaims`] (which refuses unauthenticated
//! requests) and hands the resulting principal to the engine, which performs its own capability checks.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use order_payment_engine::{
    db_types::OrderId,
    order_objects::{
        Adjudication,
        CancellationRequest,
        CaptureRequest,
        IntentRequest,
        OrderDraft,
        TrackingUpdateRequest,
    },
    traits::{InsertOrderResult, OrderManagement, PaymentGateway, ProductCatalog},
    CancellationApi,
    OrderFlowApi,
    PaymentFlowApi,
};

use crate::{auth::JwtClaims, config::ServerOptions, errors::ServerError, helpers::get_remote_ip};

/// The storage an order service needs: the orders themselves, plus the catalog used to price them.
pub trait OrderBackend: OrderManagement + ProductCatalog {}

impl<T: OrderManagement + ProductCatalog> OrderBackend for T {}

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl OrderBackend);
/// Creates a cash-on-delivery order for the caller.
///
/// Prices are always taken from the catalog. Online orders cannot be created here; they come out of the
/// `/orders/payment/capture` endpoint.
pub async fn create_order<B: OrderBackend>(
    claims: JwtClaims,
    body: web::Json<OrderDraft>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST create_order for {}", claims.sub);
    let order = api.create_cod_order(&claims.principal(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(all_orders => Get "/orders" impl OrderBackend);
/// Admins can list every order in the system, most recent first.
pub async fn all_orders<B: OrderBackend>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET all_orders for {}", claims.sub);
    let orders = api.all_orders(&claims.principal()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(my_orders => Get "/orders/mine" impl OrderBackend);
/// The caller's own orders, most recent first.
pub async fn my_orders<B: OrderBackend>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for {}", claims.sub);
    let orders = api.orders_for_user(&claims.principal()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{id}" impl OrderBackend);
/// Fetches a single order. Customers can only see their own orders.
pub async fn order_by_id<B: OrderBackend>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId::from(path.into_inner());
    debug!("💻️ GET order {id} for {}", claims.sub);
    let order = api.order_by_id(&claims.principal(), &id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_tracking => Get "/orders/{id}/tracking" impl OrderBackend);
pub async fn order_tracking<B: OrderBackend>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId::from(path.into_inner());
    debug!("💻️ GET tracking for order {id} for {}", claims.sub);
    let tracking = api.tracking_for_order(&claims.principal(), &id).await?;
    Ok(HttpResponse::Ok().json(tracking))
}

route!(update_tracking => Post "/orders/{id}/track" impl OrderBackend);
/// Admins move orders through fulfilment with this endpoint. The body carries the new tracking status and optional
/// `message`, `location` and `metadata` fields. The event timestamp is always assigned by the server.
pub async fn update_tracking<B: OrderBackend>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<TrackingUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId::from(path.into_inner());
    let update = body.into_inner();
    debug!("💻️ POST tracking update '{}' for order {id} by {}", update.status, claims.sub);
    let order = api.update_tracking(&claims.principal(), &id, update).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payment_intent => Post "/orders/payment/intent" impl OrderBackend, PaymentGateway);
/// The first phase of an online payment. Reserves the payment with the gateway and returns what the browser checkout
/// needs to collect it. Nothing is stored.
pub async fn payment_intent<B: OrderBackend, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<IntentRequest>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST payment intent for {} by {}", body.amount, claims.sub);
    let intent = api.create_intent(&claims.principal(), body.amount).await?;
    Ok(HttpResponse::Ok().json(intent))
}

route!(payment_capture => Post "/orders/payment/capture" impl OrderBackend, PaymentGateway);
/// The second phase of an online payment. The gateway's signed capture is verified and the paid order is created.
///
/// Replaying a capture that was already processed returns the existing order with a 200 rather than a 201.
pub async fn payment_capture<B: OrderBackend, G: PaymentGateway>(
    req: HttpRequest,
    claims: JwtClaims,
    body: web::Json<CaptureRequest>,
    api: web::Data<PaymentFlowApi<B, G>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let remote_ip = get_remote_ip(&req, *options.get_ref()).map(|ip| ip.to_string()).unwrap_or_else(|| "?".into());
    info!("💻️ POST payment capture {} for intent {} by {} from {remote_ip}", request.capture_id, request.intent_id, claims.sub);
    let result = api.capture(&claims.principal(), request).await.map_err(|e| {
        warn!("💻️ Capture from {remote_ip} was refused. {e}");
        e
    })?;
    match result {
        InsertOrderResult::Inserted(order) => Ok(HttpResponse::Created().json(order)),
        InsertOrderResult::AlreadyExists(order) => Ok(HttpResponse::Ok().json(order)),
    }
}

//----------------------------------------------   Cancellations  -----------------------------------------------
route!(request_cancellation => Post "/orders/{id}/cancel" impl OrderManagement, PaymentGateway);
pub async fn request_cancellation<B: OrderManagement, G: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: Option<web::Json<CancellationRequest>>,
    api: web::Data<CancellationApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId::from(path.into_inner());
    let request = body.map(|b| b.into_inner()).unwrap_or_default();
    debug!("💻️ POST cancellation request for order {id} by {}", claims.sub);
    let order = api.request_cancellation(&claims.principal(), &id, request).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(handle_cancellation => Put "/orders/{id}/cancel/handle" impl OrderManagement, PaymentGateway);
/// Admins approve or reject a cancellation request here.
///
/// An approval with `refund_now` set also tries to refund the payment. The refund outcome is reported in the response
/// body. A failed refund does not fail the request: the approval stands, and the refund can be retried.
pub async fn handle_cancellation<B: OrderManagement, G: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<Adjudication>,
    api: web::Data<CancellationApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId::from(path.into_inner());
    let adjudication = body.into_inner();
    debug!("💻️ PUT cancellation decision {:?} for order {id} by {}", adjudication.action, claims.sub);
    let outcome = api.adjudicate(&claims.principal(), &id, adjudication).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(retry_refund => Post "/orders/{id}/refund/retry" impl OrderManagement, PaymentGateway);
pub async fn retry_refund<B: OrderManagement, G: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<CancellationApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId::from(path.into_inner());
    debug!("💻️ POST refund retry for order {id} by {}", claims.sub);
    let order = api.retry_refund(&claims.principal(), &id).await?;
    Ok(HttpResponse::Ok().json(order))
}
