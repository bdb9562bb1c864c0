use std::collections::HashMap;

use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::CatalogProduct;

pub async fn fetch_products(
    ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<HashMap<String, CatalogProduct>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut builder = QueryBuilder::new("SELECT id, name, price, image FROM products WHERE id IN (");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(id.as_str());
    }
    list.push_unseparated(")");
    trace!("🗃️ Executing query: {}", builder.sql());
    let products: Vec<CatalogProduct> = builder.build_query_as().fetch_all(conn).await?;
    Ok(products.into_iter().map(|p| (p.id.clone(), p)).collect())
}

/// Inserts or replaces a catalog entry. The engine never calls this itself; it exists for seeding and tooling.
pub async fn upsert_product(product: &CatalogProduct, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO products (id, name, price, image) VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE SET
            name = excluded.name,
            price = excluded.price,
            image = excluded.image,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(product.price)
    .bind(&product.image)
    .execute(conn)
    .await?;
    Ok(())
}
