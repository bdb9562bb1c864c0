use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId, PaymentMethod, PaymentStatus},
    events::{EventProducers, OrderCreatedEvent, OrderStatusChangedEvent},
    ope_api::{
        errors::OrderFlowError,
        flow_support::{modify_order, FlowOptions},
        order_objects::{OrderDraft, TrackingUpdateRequest, TrackingView},
        pricing::price_draft,
        principal::Principal,
    },
    state_machine::{apply_transition, TrackingUpdate},
    traits::{OrderManagement, ProductCatalog},
};

pub const COD_ORDER_MESSAGE: &str = "Order placed with Cash on Delivery";

/// `OrderFlowApi` handles cash-on-delivery orders, order queries and the admin-driven fulfilment state machine.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    options: FlowOptions,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, options: FlowOptions::default() }
    }

    pub fn with_options(mut self, options: FlowOptions) -> Self {
        self.options = options;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement + ProductCatalog
{
    /// Creates a cash-on-delivery order for the caller.
    ///
    /// The draft is re-priced from the catalog. Online orders are refused here; they are only ever created by a
    /// verified capture (see [`crate::PaymentFlowApi::capture`]).
    pub async fn create_cod_order(&self, principal: &Principal, draft: OrderDraft) -> Result<Order, OrderFlowError> {
        if draft.payment_method == PaymentMethod::Online {
            return Err(OrderFlowError::ValidationError(
                "Use the online payment flow for online payments".into(),
            ));
        }
        let priced = price_draft(&self.db, &self.options.pricing, &draft).await?;
        let now = Utc::now();
        let new_order = NewOrder {
            user_id: principal.user_id.clone(),
            items: priced.items,
            shipping_address: draft.shipping_address,
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Pending,
            payment_info: None,
            items_price: priced.quote.items_price,
            shipping_price: priced.quote.shipping_price,
            tax_price: priced.quote.tax_price,
            total_price: priced.quote.total_price,
            paid_at: None,
            initial_message: COD_ORDER_MESSAGE.to_string(),
            created_at: now,
        };
        let order = self.db.insert_order(new_order).await?.into_order();
        info!("🔄️📦️ COD order {} created for user {} ({})", order.id, order.user_id, order.total_price);
        self.producers.publish_order_created(OrderCreatedEvent::new(order.clone())).await;
        Ok(order)
    }

    /// The caller's own orders, most recent first.
    pub async fn orders_for_user(&self, principal: &Principal) -> Result<Vec<Order>, OrderFlowError> {
        let orders = self.db.fetch_orders_for_user(&principal.user_id).await?;
        trace!("🔄️ {} orders fetched for user {}", orders.len(), principal.user_id);
        Ok(orders)
    }

    /// Every order in the system, most recent first. Admin only.
    pub async fn all_orders(&self, principal: &Principal) -> Result<Vec<Order>, OrderFlowError> {
        principal.require_admin()?;
        let orders = self.db.fetch_all_orders().await?;
        Ok(orders)
    }

    pub async fn order_by_id(&self, principal: &Principal, id: &OrderId) -> Result<Order, OrderFlowError> {
        let order = self.db.fetch_order_by_id(id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(id.clone()))?;
        principal.require_owner_or_admin(&order)?;
        Ok(order)
    }

    pub async fn tracking_for_order(&self, principal: &Principal, id: &OrderId) -> Result<TrackingView, OrderFlowError> {
        let order = self.order_by_id(principal, id).await?;
        Ok(TrackingView::from(order))
    }

    /// Applies an admin tracking update to the order and persists it.
    ///
    /// The whole transition is a single read-modify-write cycle. Concurrent writers are resolved by retrying on a
    /// fresh copy of the order.
    pub async fn update_tracking(
        &self,
        principal: &Principal,
        id: &OrderId,
        request: TrackingUpdateRequest,
    ) -> Result<Order, OrderFlowError> {
        principal.require_admin()?;
        let update = TrackingUpdate::try_from(request)?;
        let (order, effect) = modify_order(&self.db, id, self.options.max_save_retries, |order| {
            apply_transition(order, &update, Utc::now()).map_err(OrderFlowError::from)
        })
        .await?;
        debug!(
            "🔄️ Order {id}: {} event added by {}. Status {} -> {}",
            update.status, principal.user_id, effect.old_status, effect.new_status
        );
        if effect.old_status != effect.new_status {
            let event = OrderStatusChangedEvent::new(effect.old_status, order.clone());
            self.producers.publish_status_changed(event).await;
        }
        Ok(order)
    }
}
