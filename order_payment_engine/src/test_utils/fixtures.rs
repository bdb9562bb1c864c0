use opg_common::Money;

use crate::{
    db_types::{CatalogProduct, ShippingAddress},
    ope_api::order_objects::{DraftItem, OrderDraft},
    SqliteDatabase,
};

/// A small catalog: a 1000.00 lamp, a 499.50 vase and a 250.00 cushion.
pub fn sample_products() -> Vec<CatalogProduct> {
    vec![
        CatalogProduct {
            id: "lamp".into(),
            name: "Brass Table Lamp".into(),
            price: Money::from_major(1000),
            image: Some("/images/lamp.jpg".into()),
        },
        CatalogProduct {
            id: "vase".into(),
            name: "Ceramic Vase".into(),
            price: Money::from_minor(49_950),
            image: Some("/images/vase.jpg".into()),
        },
        CatalogProduct { id: "cushion".into(), name: "Linen Cushion".into(), price: Money::from_major(250), image: None },
    ]
}

pub async fn seed_products(db: &SqliteDatabase) {
    for product in sample_products() {
        db.upsert_product(&product).await.expect("Error seeding product");
    }
}

pub fn sample_address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Asha Rao".into(),
        address1: "12 MG Road".into(),
        address2: String::default(),
        city: "Bengaluru".into(),
        state: "Karnataka".into(),
        postal_code: "560001".into(),
        phone: "9876543210".into(),
        landmark: "Opposite the metro station".into(),
    }
}

/// A draft for `qty` units of a single catalog product.
pub fn draft_for(product_id: &str, qty: i64) -> OrderDraft {
    OrderDraft::new(vec![DraftItem::new(product_id, qty)], sample_address())
}
