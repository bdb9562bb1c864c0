use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for `POST /v1/orders`. Amounts are in minor units (paise).
#[derive(Debug, Clone, Serialize)]
pub struct NewRazorpayOrder {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
    #[serde(default)]
    pub created_at: i64,
}

/// Request body for `POST /v1/payments/{id}/refund`.
#[derive(Debug, Clone, Serialize)]
pub struct NewRefund {
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RazorpayRefund {
    pub id: String,
    pub payment_id: String,
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    pub status: String,
}
