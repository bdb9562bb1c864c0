use opg_common::Money;
use thiserror::Error;

use crate::{
    db_types::OrderId,
    state_machine::{CancellationError, TransitionError},
    traits::{CatalogError, GatewayError, OrderStoreError},
};

/// Every failure an engine API can report. The variants fall into the classes that the HTTP layer maps onto status
/// codes: validation, not found, forbidden, conflict, signature, gateway, storage contention and database errors.
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),
    #[error("Access denied. {0}")]
    Forbidden(String),
    #[error("Illegal status transition. {0}")]
    IllegalTransition(String),
    #[error("{0}")]
    CancellationNotAllowed(String),
    #[error("A cancellation has already been requested for this order")]
    AlreadyRequested,
    #[error("No cancellation request found for this order")]
    NoActiveCancellation,
    #[error("The cancellation request has already been processed")]
    AlreadyProcessed,
    #[error("{0}")]
    RefundNotApplicable(String),
    #[error(
        "The captured amount ({captured}) does not match the order total ({expected}). {}",
        mismatch_refund_note(.refund_id)
    )]
    AmountMismatch { expected: Money, captured: Money, refund_id: Option<String> },
    #[error("Invalid payment signature")]
    InvalidSignature,
    #[error("Payment gateway error. {0}")]
    GatewayUnavailable(String),
    #[error("The refund could not be initiated. {0}")]
    RefundFailed(String),
    #[error("The order is being modified by someone else. Please try again. {0}")]
    StorageConflict(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

fn mismatch_refund_note(refund_id: &Option<String>) -> String {
    match refund_id {
        Some(id) => format!("The payment has been refunded ({id})."),
        None => "The payment could not be refunded automatically. Please contact support.".to_string(),
    }
}

impl OrderFlowError {
    /// True for errors that signal a clash with the current state of the order rather than a bad request.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::IllegalTransition(_) |
                Self::CancellationNotAllowed(_) |
                Self::AlreadyRequested |
                Self::NoActiveCancellation |
                Self::AlreadyProcessed |
                Self::RefundNotApplicable(_) |
                Self::AmountMismatch { .. }
        )
    }
}

impl From<OrderStoreError> for OrderFlowError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            OrderStoreError::VersionConflict(id) => Self::StorageConflict(format!("Order {id} changed while saving")),
            e @ OrderStoreError::DuplicateCapture { .. } => Self::StorageConflict(e.to_string()),
            OrderStoreError::DatabaseError(s) | OrderStoreError::InvalidData(s) => Self::DatabaseError(s),
        }
    }
}

impl From<GatewayError> for OrderFlowError {
    fn from(e: GatewayError) -> Self {
        Self::GatewayUnavailable(e.to_string())
    }
}

impl From<CatalogError> for OrderFlowError {
    fn from(e: CatalogError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<TransitionError> for OrderFlowError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::InvalidStatus(_) => Self::ValidationError(e.to_string()),
            TransitionError::Illegal { .. } => Self::IllegalTransition(e.to_string()),
        }
    }
}

impl From<CancellationError> for OrderFlowError {
    fn from(e: CancellationError) -> Self {
        match e {
            CancellationError::NotAllowed(_) => Self::CancellationNotAllowed(e.to_string()),
            CancellationError::AlreadyRequested => Self::AlreadyRequested,
            CancellationError::AlreadyProcessed => Self::AlreadyProcessed,
            CancellationError::NoActiveCancellation => Self::NoActiveCancellation,
            CancellationError::RefundNotApplicable(_) => Self::RefundNotApplicable(e.to_string()),
        }
    }
}
