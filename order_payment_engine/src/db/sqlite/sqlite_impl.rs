//! `SqliteDatabase` is a concrete implementation of an order payment engine backend.
//!
//! It uses SQLite as the backend and implements the storage traits defined in the [`crate::traits`] module.
use std::{collections::HashMap, fmt::Debug};

use chrono::Utc;
use log::*;
use sqlx::{migrate, SqlitePool};

use super::{db_url, new_pool, orders, orders::OrderQueryFilter, products};
use crate::{
    db_types::{CatalogProduct, NewOrder, Order, OrderId},
    traits::{CatalogError, InsertOrderResult, OrderManagement, OrderStoreError, ProductCatalog},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, OrderStoreError> {
        if let Some(info) = &order.payment_info {
            let existing = self.fetch_order_by_capture(&info.intent_id, &info.capture_id).await?;
            if let Some(existing) = existing {
                debug!("🗃️ Capture {} has already been recorded against order {}", info.capture_id, existing.id);
                return Ok(InsertOrderResult::AlreadyExists(existing));
            }
        }
        let mut tx = self.pool.begin().await?;
        match orders::insert_order(order, &mut tx).await {
            Ok(order) => {
                tx.commit().await?;
                debug!("🗃️ Order {} has been saved in the DB", order.id);
                Ok(InsertOrderResult::Inserted(order))
            },
            // Lost a race with a concurrent capture of the same payment. The tx is rolled back on drop.
            Err(OrderStoreError::DuplicateCapture { intent_id, capture_id }) => {
                drop(tx);
                warn!("🗃️ Concurrent insert for capture {capture_id} detected. Returning the existing order.");
                self.fetch_order_by_capture(&intent_id, &capture_id)
                    .await?
                    .map(InsertOrderResult::AlreadyExists)
                    .ok_or(OrderStoreError::DuplicateCapture { intent_id, capture_id })
            },
            Err(e) => Err(e),
        }
    }

    async fn fetch_order_by_id(&self, id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_id(id, &mut conn).await
    }

    async fn fetch_order_by_capture(
        &self,
        intent_id: &str,
        capture_id: &str,
    ) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        match orders::fetch_order_id_by_capture(intent_id, capture_id, &mut conn).await? {
            Some(id) => orders::fetch_order_by_id(&id, &mut conn).await,
            None => Ok(None),
        }
    }

    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let query = OrderQueryFilter::default().with_user_id(user_id);
        orders::search_orders(query, &mut conn).await
    }

    async fn fetch_all_orders(&self) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::search_orders(OrderQueryFilter::default(), &mut conn).await
    }

    async fn save_order(&self, order: &Order) -> Result<Order, OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::update_order(order, Utc::now(), &mut tx).await?;
        if !updated {
            return if orders::order_exists(&order.id, &mut tx).await? {
                debug!("🗃️ Order {} is no longer at version {}. Save rejected.", order.id, order.version);
                Err(OrderStoreError::VersionConflict(order.id.clone()))
            } else {
                Err(OrderStoreError::OrderNotFound(order.id.clone()))
            };
        }
        let stored = usize::try_from(orders::count_tracking_events(&order.id, &mut tx).await?)
            .map_err(|e| OrderStoreError::InvalidData(e.to_string()))?;
        // The version check passed, so a longer stored timeline means the caller dropped events.
        if stored > order.tracking.len() {
            warn!(
                "🗃️ Order {} has {stored} stored tracking events but the update only carries {}. Save rejected.",
                order.id,
                order.tracking.len()
            );
            return Err(OrderStoreError::VersionConflict(order.id.clone()));
        }
        orders::append_tracking_events(&order.id, stored, &order.tracking[stored..], &mut tx).await?;
        if let Some(record) = &order.cancellation {
            orders::upsert_cancellation(&order.id, record, &mut tx).await?;
        }
        let saved =
            orders::fetch_order_by_id(&order.id, &mut tx).await?.ok_or(OrderStoreError::OrderNotFound(order.id.clone()))?;
        tx.commit().await?;
        trace!("🗃️ Order {} saved at version {}", saved.id, saved.version);
        Ok(saved)
    }

    async fn fetch_orders_with_pending_refunds(&self) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let query = OrderQueryFilter::default().with_pending_refund();
        orders::search_orders(query, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), OrderStoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl ProductCatalog for SqliteDatabase {
    async fn fetch_products(&self, ids: &[String]) -> Result<HashMap<String, CatalogProduct>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(ids, &mut conn).await?;
        Ok(products)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Inserts or replaces a catalog entry.
    pub async fn upsert_product(&self, product: &CatalogProduct) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        products::upsert_product(product, &mut conn).await
    }
}
