use std::collections::HashMap;

use mockall::mock;
use order_payment_engine::{
    db_types::{CatalogProduct, NewOrder, Order, OrderId},
    test_utils::fixtures::sample_products,
    traits::{CatalogError, InsertOrderResult, OrderManagement, OrderStoreError, ProductCatalog},
};

mock! {
    pub OrderStore {}
    impl Clone for OrderStore {
        fn clone(&self) -> Self;
    }
    impl OrderManagement for OrderStore {
        async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, OrderStoreError>;
        async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, OrderStoreError>;
        async fn fetch_order_by_capture(&self, intent_id: &str, capture_id: &str) -> Result<Option<Order>, OrderStoreError>;
        async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderStoreError>;
        async fn fetch_all_orders(&self) -> Result<Vec<Order>, OrderStoreError>;
        async fn save_order(&self, order: &Order) -> Result<Order, OrderStoreError>;
        async fn fetch_orders_with_pending_refunds(&self) -> Result<Vec<Order>, OrderStoreError>;
    }
    impl ProductCatalog for OrderStore {
        async fn fetch_products(&self, ids: &[String]) -> Result<HashMap<String, CatalogProduct>, CatalogError>;
    }
}

impl MockOrderStore {
    /// Serves catalog lookups from the sample product list.
    pub fn with_sample_catalog(mut self) -> Self {
        self.expect_fetch_products().returning(|ids| {
            Ok(sample_products().into_iter().filter(|p| ids.contains(&p.id)).map(|p| (p.id.clone(), p)).collect())
        });
        self
    }
}
