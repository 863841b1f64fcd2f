//! Gateway-neutral request and response types

use serde::{Deserialize, Serialize};

/// Hosted-checkout request for one donation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Our idempotency key, echoed back in every notification
    pub order_id: String,
    /// Whole currency units; must be positive
    pub amount: i64,
    pub customer: CustomerDetails,
    pub items: Vec<ItemDetail>,
    /// Where the checkout page sends the donor afterwards
    pub finish_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetail {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub quantity: u32,
}

/// Token and URL for the gateway-hosted payment page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub token: String,
    pub redirect_url: String,
}

/// Authoritative status as reported by the gateway's status API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTransactionStatus {
    pub order_id: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub status_code: String,
    pub gross_amount: String,
}

/// Body of an asynchronous payment notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub order_id: String,
    pub status_code: String,
    /// Decimal string exactly as sent, e.g. "50000.00"; the signature covers it verbatim
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}
