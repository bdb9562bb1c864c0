use std::{future::Future, time::Duration};

use log::*;
use opg_common::DEFAULT_CURRENCY_CODE;

use crate::{
    db_types::{Order, OrderId},
    ope_api::{errors::OrderFlowError, pricing::PricingPolicy},
    traits::{GatewayError, OrderManagement, OrderStoreError},
};

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_SAVE_RETRIES: u32 = 3;

/// Tunables shared by the engine APIs.
#[derive(Debug, Clone)]
pub struct FlowOptions {
    /// ISO currency code used for payment intents.
    pub currency: String,
    /// Upper bound on every call to the payment gateway.
    pub gateway_timeout: Duration,
    /// How many times a read-modify-write is retried after a version conflict.
    pub max_save_retries: u32,
    pub pricing: PricingPolicy,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            max_save_retries: DEFAULT_MAX_SAVE_RETRIES,
            pricing: PricingPolicy::default(),
        }
    }
}

/// Loads the order, applies `modify` and saves the result, all guarded by the order version.
///
/// When the save loses a race with another writer, the whole cycle is repeated on a fresh copy of the order, up to
/// `max_retries` times. `modify` must therefore be free of side effects outside the order it is handed. Errors from
/// `modify` abort immediately and nothing is written.
pub async fn modify_order<B, F, T>(
    db: &B,
    id: &OrderId,
    max_retries: u32,
    mut modify: F,
) -> Result<(Order, T), OrderFlowError>
where
    B: OrderManagement,
    F: FnMut(&mut Order) -> Result<T, OrderFlowError>,
{
    let mut attempt = 0;
    loop {
        let mut order = db.fetch_order_by_id(id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(id.clone()))?;
        let result = modify(&mut order)?;
        match db.save_order(&order).await {
            Ok(saved) => return Ok((saved, result)),
            Err(OrderStoreError::VersionConflict(_)) if attempt < max_retries => {
                attempt += 1;
                debug!("🔄️ Order {id} was modified concurrently. Retrying ({attempt}/{max_retries})");
            },
            Err(OrderStoreError::VersionConflict(_)) => {
                warn!("🔄️ Giving up on order {id} after {} attempts", attempt + 1);
                return Err(OrderFlowError::StorageConflict(format!(
                    "Order {id} could not be saved after {} attempts",
                    attempt + 1
                )));
            },
            Err(e) => return Err(e.into()),
        }
    }
}

/// Runs a gateway call with an upper bound on how long it may take.
pub async fn call_gateway<T, F>(timeout: Duration, call: F) -> Result<T, GatewayError>
where F: Future<Output = Result<T, GatewayError>> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(timeout.as_secs())),
    }
}
