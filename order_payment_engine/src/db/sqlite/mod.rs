//! # SQLite backend
//!
//! Low-level SQLite interactions live in the submodules as plain functions that accept a `&mut SqliteConnection`.
//! Callers can obtain a connection from a pool, or open an atomic transaction and pass `&mut tx` through without any
//! other changes. [`SqliteDatabase`] composes these functions into the backend traits.
use std::{env, str::FromStr};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod orders;
pub mod products;
mod sqlite_impl;

pub use sqlite_impl::SqliteDatabase;

const SQLITE_DB_URL: &str = "sqlite://data/order_store.db";

pub fn db_url() -> String {
    let result = env::var("OPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ OPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
