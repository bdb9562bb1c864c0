use opg_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::Order;

#[derive(Debug, Clone)]
pub enum InsertOrderResult {
    Inserted(Order),
    /// An order with the same gateway payment references already exists. The existing order is returned untouched.
    AlreadyExists(Order),
}

impl InsertOrderResult {
    pub fn order(&self) -> &Order {
        match self {
            InsertOrderResult::Inserted(o) | InsertOrderResult::AlreadyExists(o) => o,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            InsertOrderResult::Inserted(o) | InsertOrderResult::AlreadyExists(o) => o,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, InsertOrderResult::Inserted(_))
    }
}

/// A provider-side reservation for an upcoming payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub amount: Money,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub refund_id: String,
    pub amount: Money,
    pub status: String,
}
