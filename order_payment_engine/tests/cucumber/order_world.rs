use cucumber::World;
use order_payment_engine::{db_types::Order, helpers::CaptureSignature, order_objects::IntentResponse, OrderFlowError};

use crate::support::TestSystem;

#[derive(Default, Debug, World)]
pub struct OrderWorld {
    pub system: Option<TestSystem>,
    pub order: Option<Order>,
    pub intent: Option<IntentResponse>,
    pub capture: Option<CaptureSignature>,
    pub last_error: Option<OrderFlowError>,
}

impl OrderWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("Order system not initialised")
    }

    pub fn order(&self) -> &Order {
        self.order.as_ref().expect("No order has been placed")
    }

    /// Stores the result of a request: the order on success, the error otherwise.
    pub fn record(&mut self, result: Result<Order, OrderFlowError>) {
        match result {
            Ok(order) => {
                self.order = Some(order);
                self.last_error = None;
            },
            Err(e) => self.last_error = Some(e),
        }
    }
}
