use std::time::Duration;

use log::*;
use order_payment_engine::{events::EventProducers, CancellationApi, FlowOptions, SqliteDatabase};
use tokio::task::JoinHandle;

use crate::integrations::razorpay::RazorpayGateway;

/// Starts the refund worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, each approved cancellation whose refund has not been initiated yet is sent to the gateway again.
pub fn start_refund_worker(
    db: SqliteDatabase,
    gateway: RazorpayGateway,
    producers: EventProducers,
    options: FlowOptions,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = CancellationApi::new(db, gateway, producers).with_options(options);
        info!("🕰️ Refund worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running refund retry job");
            match api.retry_pending_refunds().await {
                Ok(sweep) if sweep.attempted == 0 => trace!("🕰️ No outstanding refunds"),
                Ok(sweep) => {
                    info!("🕰️ {} refunds retried. {} succeeded, {} failed", sweep.attempted, sweep.succeeded, sweep.failed)
                },
                Err(e) => {
                    error!("🕰️ Error running refund retry job: {e}");
                },
            }
        }
    })
}
