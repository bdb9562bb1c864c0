//! Server-side pricing.
//!
//! Clients submit product ids and quantities. Unit prices come from the [`ProductCatalog`], and shipping and tax are
//! derived from the configured [`PricingPolicy`]. Any totals the client sends along are only compared against the
//! computed ones and logged when they differ.
use log::*;
use opg_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::OrderItem,
    ope_api::{
        errors::OrderFlowError,
        order_objects::{DraftItem, OrderDraft},
    },
    traits::ProductCatalog,
};

/// The largest quantity accepted for a single line item.
pub const MAX_ITEM_QTY: i64 = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Flat shipping fee charged per order.
    pub shipping_fee: Money,
    /// Orders whose item total reaches this amount ship for free.
    pub free_shipping_threshold: Option<Money>,
    /// Tax rate on the item total, in basis points (1800 = 18%).
    pub tax_rate_bps: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub items_price: Money,
    pub shipping_price: Money,
    pub tax_price: Money,
    pub total_price: Money,
}

impl PricingPolicy {
    /// Adds shipping and tax to the item total. `None` if the total does not fit in a [`Money`].
    pub fn quote(&self, items_price: Money) -> Option<PriceQuote> {
        let free_shipping = self.free_shipping_threshold.map(|t| items_price >= t).unwrap_or(false);
        let shipping_price = if free_shipping { Money::default() } else { self.shipping_fee };
        let tax_price = items_price.apply_basis_points(self.tax_rate_bps)?;
        let total_price = Money::checked_sum([items_price, shipping_price, tax_price])?;
        Some(PriceQuote { items_price, shipping_price, tax_price, total_price })
    }
}

/// A draft whose items have been resolved against the catalog and priced.
#[derive(Debug, Clone)]
pub struct PricedDraft {
    pub items: Vec<OrderItem>,
    pub quote: PriceQuote,
}

pub async fn price_draft<C: ProductCatalog>(
    catalog: &C,
    policy: &PricingPolicy,
    draft: &OrderDraft,
) -> Result<PricedDraft, OrderFlowError> {
    let items = price_items(catalog, &draft.items).await?;
    let quote = items
        .iter()
        .map(OrderItem::line_total)
        .collect::<Option<Vec<_>>>()
        .and_then(Money::checked_sum)
        .and_then(|items_price| policy.quote(items_price))
        .ok_or_else(|| OrderFlowError::ValidationError("The order total is too large".into()))?;
    if let Some(client_total) = draft.total_price {
        if client_total != quote.total_price {
            warn!(
                "🔄️ Client-supplied total of {client_total} does not match the computed total of {}. Using the \
                 computed total.",
                quote.total_price
            );
        }
    }
    Ok(PricedDraft { items, quote })
}

/// Resolves each draft item against the catalog. Unknown products and quantities outside `1..=MAX_ITEM_QTY` are
/// rejected.
pub async fn price_items<C: ProductCatalog>(
    catalog: &C,
    items: &[DraftItem],
) -> Result<Vec<OrderItem>, OrderFlowError> {
    if items.is_empty() {
        return Err(OrderFlowError::ValidationError("No order items".into()));
    }
    if let Some(item) = items.iter().find(|i| !(1..=MAX_ITEM_QTY).contains(&i.qty)) {
        return Err(OrderFlowError::ValidationError(format!(
            "Quantity for product {} must be between 1 and {MAX_ITEM_QTY}",
            item.product_id
        )));
    }
    let ids = items.iter().map(|i| i.product_id.clone()).collect::<Vec<_>>();
    let products = catalog.fetch_products(&ids).await?;
    items
        .iter()
        .map(|item| {
            let product = products.get(&item.product_id).ok_or_else(|| {
                OrderFlowError::ValidationError(format!("Product {} does not exist", item.product_id))
            })?;
            if let Some(client_price) = item.price {
                if client_price != product.price {
                    debug!(
                        "🔄️ Client price for {} was {client_price}, catalog price is {}",
                        product.id, product.price
                    );
                }
            }
            Ok(OrderItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                price: product.price,
                qty: item.qty,
                image: product.image.clone().or_else(|| item.image.clone()),
                selected_size: item.selected_size.clone(),
            })
        })
        .collect()
}
