use std::collections::HashMap;

use thiserror::Error;

use crate::db_types::CatalogProduct;

/// Read-only access to authoritative product prices.
#[allow(async_fn_in_trait)]
pub trait ProductCatalog {
    /// Fetches the products with the given ids. Unknown ids are simply absent from the result.
    async fn fetch_products(&self, ids: &[String]) -> Result<HashMap<String, CatalogProduct>, CatalogError>;
}

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Catalog lookup failed: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        CatalogError::DatabaseError(e.to_string())
    }
}
