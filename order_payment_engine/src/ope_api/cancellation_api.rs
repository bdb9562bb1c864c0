//! Cancellation requests, admin adjudication and refunds.
//!
//! The refund is deliberately decoupled from the approval. Approving a cancellation is a business decision that is
//! committed on its own. The gateway refund runs afterwards and only ever updates the refund bookkeeping on the
//! cancellation record. A failed refund therefore leaves a `Returned` order with an approved cancellation and
//! `refund_initiated = false`, which [`CancellationApi::retry_refund`] and [`CancellationApi::retry_pending_refunds`]
//! pick up later.
use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Order, OrderId},
    events::{EventProducers, OrderStatusChangedEvent, RefundEvent, RefundOutcome},
    ope_api::{
        errors::OrderFlowError,
        flow_support::{call_gateway, modify_order, FlowOptions},
        order_objects::{Adjudication, AdjudicationAction, AdjudicationOutcome, CancellationRequest, RefundSweep},
        principal::Principal,
    },
    state_machine::{
        self,
        record_refund_failure,
        record_refund_success,
        refund_eligibility,
        Decision,
        RefundDue,
    },
    traits::{OrderManagement, PaymentGateway},
};

pub struct CancellationApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    options: FlowOptions,
}

impl<B, G> Debug for CancellationApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CancellationApi")
    }
}

impl<B, G> CancellationApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, options: FlowOptions::default() }
    }

    pub fn with_options(mut self, options: FlowOptions) -> Self {
        self.options = options;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> CancellationApi<B, G>
where
    B: OrderManagement,
    G: PaymentGateway,
{
    /// Opens a cancellation request on behalf of the order owner (or an admin).
    pub async fn request_cancellation(
        &self,
        principal: &Principal,
        id: &OrderId,
        request: CancellationRequest,
    ) -> Result<Order, OrderFlowError> {
        let (order, old_status) = modify_order(&self.db, id, self.options.max_save_retries, |order| {
            principal.require_owner_or_admin(order)?;
            let old_status = order.status;
            state_machine::request_cancellation(order, &request.reason, &request.message, Utc::now())?;
            Ok(old_status)
        })
        .await?;
        info!("↩️ Cancellation requested for order {id} by {}", principal.user_id);
        self.producers.publish_status_changed(OrderStatusChangedEvent::new(old_status, order.clone())).await;
        Ok(order)
    }

    /// Approves or rejects an open cancellation request. Admin only.
    ///
    /// The decision is committed before any refund is attempted. If an immediate refund was asked for and it fails,
    /// the approval stands, the failure is recorded on the cancellation, and the call still succeeds. The outcome of
    /// the refund is reported in [`AdjudicationOutcome::refund`].
    pub async fn adjudicate(
        &self,
        principal: &Principal,
        id: &OrderId,
        adjudication: Adjudication,
    ) -> Result<AdjudicationOutcome, OrderFlowError> {
        principal.require_admin()?;
        let decision = Decision::from(adjudication.action);
        let (order, old_status) = modify_order(&self.db, id, self.options.max_save_retries, |order| {
            let old_status = order.status;
            state_machine::adjudicate(order, decision, &principal.user_id, Utc::now())?;
            Ok(old_status)
        })
        .await?;
        info!("↩️ Cancellation for order {id} {:?} by {}", adjudication.action, principal.user_id);
        self.producers.publish_status_changed(OrderStatusChangedEvent::new(old_status, order.clone())).await;
        if adjudication.action == AdjudicationAction::Reject || !adjudication.refund_now {
            return Ok(AdjudicationOutcome { action: adjudication.action, order, refund: RefundOutcome::NotAttempted });
        }
        let (order, refund) = match refund_eligibility(&order) {
            Ok(due) => self.attempt_refund(order, due).await,
            Err(e) => {
                if order.is_online_and_paid() {
                    warn!("↩️ Order {id} was paid online but cannot be refunded automatically. {e}");
                } else {
                    debug!("↩️ No automatic refund for order {id}. {e}");
                }
                (order, RefundOutcome::NotAttempted)
            },
        };
        Ok(AdjudicationOutcome { action: adjudication.action, order, refund })
    }

    /// Retries the refund for an approved cancellation whose refund has not gone through yet. Admin only.
    ///
    /// A gateway failure is reported as [`OrderFlowError::RefundFailed`], but the attempt is still recorded on the
    /// order.
    pub async fn retry_refund(&self, principal: &Principal, id: &OrderId) -> Result<Order, OrderFlowError> {
        principal.require_admin()?;
        let order = self.db.fetch_order_by_id(id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(id.clone()))?;
        let due = refund_eligibility(&order)?;
        info!("↩️ Refund retry for order {id} requested by {}", principal.user_id);
        match self.attempt_refund(order, due).await {
            (order, RefundOutcome::Initiated { .. }) => Ok(order),
            (_, RefundOutcome::Failed { error }) => Err(OrderFlowError::RefundFailed(error)),
            (order, RefundOutcome::NotAttempted) => Ok(order),
        }
    }

    /// Attempts every outstanding refund once. Used by the background refund worker.
    pub async fn retry_pending_refunds(&self) -> Result<RefundSweep, OrderFlowError> {
        let pending = self.db.fetch_orders_with_pending_refunds().await?;
        let mut sweep = RefundSweep::default();
        for order in pending {
            let due = match refund_eligibility(&order) {
                Ok(due) => due,
                Err(e) => {
                    debug!("↩️ Skipping order {}. {e}", order.id);
                    continue;
                },
            };
            sweep.attempted += 1;
            match self.attempt_refund(order, due).await {
                (_, RefundOutcome::Initiated { .. }) => sweep.succeeded += 1,
                _ => sweep.failed += 1,
            }
        }
        if sweep.attempted > 0 {
            info!(
                "↩️ Refund sweep complete. {} attempted, {} succeeded, {} failed",
                sweep.attempted, sweep.succeeded, sweep.failed
            );
        }
        Ok(sweep)
    }

    /// Calls the gateway and records the result. Never fails: problems are logged and reflected in the outcome.
    async fn attempt_refund(&self, order: Order, due: RefundDue) -> (Order, RefundOutcome) {
        let id = order.id.clone();
        let refund = self.gateway.refund(&due.capture_id, due.amount);
        let result = call_gateway(self.options.gateway_timeout, refund).await;
        let outcome = match &result {
            Ok(receipt) => {
                info!("↩️ Refund {} of {} initiated for order {id}", receipt.refund_id, receipt.amount);
                RefundOutcome::Initiated { refund_id: receipt.refund_id.clone() }
            },
            Err(e) => {
                error!("↩️ Refund of {} for order {id} failed. {e}", due.amount);
                RefundOutcome::Failed { error: e.to_string() }
            },
        };
        let saved = modify_order(&self.db, &id, self.options.max_save_retries, |order| {
            let now = Utc::now();
            match &result {
                Ok(receipt) => record_refund_success(order, receipt, now),
                Err(e) => record_refund_failure(order, &e.to_string(), now),
            }
            Ok(())
        })
        .await;
        let order = match saved {
            Ok((saved, _)) => saved,
            Err(e) => {
                error!(
                    "↩️ Could not record the refund result for order {id}. The gateway result was {outcome:?}. {e}"
                );
                order
            },
        };
        self.producers.publish_refund(RefundEvent::new(order.clone(), outcome.clone())).await;
        (order, outcome)
    }
}
