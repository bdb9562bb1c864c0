use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, Role},
    ope_api::errors::OrderFlowError,
};

/// The authenticated caller of an engine API. How the principal was authenticated is not the engine's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    pub fn new<S: Into<String>>(user_id: S, role: Role) -> Self {
        Self { user_id: user_id.into(), role }
    }

    pub fn customer<S: Into<String>>(user_id: S) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn admin<S: Into<String>>(user_id: S) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), OrderFlowError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(OrderFlowError::Forbidden(format!("User {} is not an administrator", self.user_id)))
        }
    }

    pub fn require_owner_or_admin(&self, order: &Order) -> Result<(), OrderFlowError> {
        if self.is_admin() || order.user_id == self.user_id {
            Ok(())
        } else {
            Err(OrderFlowError::Forbidden(format!("Order {} does not belong to user {}", order.id, self.user_id)))
        }
    }
}
