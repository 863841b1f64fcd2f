//! Payment gateway trait definitions

use crate::error::AppResult;
use crate::payments::types::{CheckoutSession, GatewayTransactionStatus, TransactionRequest};
use async_trait::async_trait;

/// Hosted-checkout payment gateway
///
/// The ledger only ever talks to the gateway through this trait, so tests
/// can substitute a scripted implementation.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name used in logs and error envelopes
    fn name(&self) -> &'static str;

    /// Open a checkout session for a donation
    ///
    /// Fails without a network call when `request.amount` is not positive.
    async fn create_transaction(&self, request: TransactionRequest) -> AppResult<CheckoutSession>;

    /// Check a notification signature
    ///
    /// Pure and total: any mismatch (including length or letter case)
    /// returns `false`.
    fn verify_signature(
        &self,
        order_id: &str,
        status_code: &str,
        gross_amount: &str,
        signature: &str,
    ) -> bool;

    /// Ask the gateway for the current status of an order
    async fn get_transaction_status(&self, order_id: &str) -> AppResult<GatewayTransactionStatus>;
}
