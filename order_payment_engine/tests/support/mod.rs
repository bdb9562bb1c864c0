#![allow(dead_code)]
use opg_common::Secret;
use order_payment_engine::{
    events::EventProducers,
    test_utils::{
        fixtures::seed_products,
        mock_gateway::{MockGateway, MOCK_KEY_SECRET},
        prepare_env::{fresh_database, remove_database},
    },
    CancellationApi,
    FlowOptions,
    OrderFlowApi,
    OrderManagement,
    PaymentFlowApi,
    SqliteDatabase,
};

#[derive(Debug)]
pub struct TestSystem {
    pub url: String,
    pub db: SqliteDatabase,
    pub gateway: MockGateway,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub payments: PaymentFlowApi<SqliteDatabase, MockGateway>,
    pub cancellations: CancellationApi<SqliteDatabase, MockGateway>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let (url, db) = fresh_database().await;
        seed_products(&db).await;
        let gateway = MockGateway::new();
        let options = FlowOptions::default();
        let orders = OrderFlowApi::new(db.clone(), producers.clone()).with_options(options.clone());
        let secret = Secret::new(MOCK_KEY_SECRET.to_string());
        let payments =
            PaymentFlowApi::new(db.clone(), gateway.clone(), secret, producers.clone()).with_options(options.clone());
        let cancellations = CancellationApi::new(db.clone(), gateway.clone(), producers).with_options(options);
        Self { url, db, gateway, orders, payments, cancellations }
    }

    pub async fn tear_down(mut self) {
        let _ = self.db.close().await;
        remove_database(&self.url).await;
    }
}
