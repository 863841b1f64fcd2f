use std::sync::Arc;
use tracing::{info, warn};

use crate::database::donation_repository::{DonationStatus, SettlementOutcome};
use crate::error::{AppResult, DomainError, ValidationError};
use crate::ledger::donations::DonationLedger;
use crate::payments::types::NotificationPayload;
use crate::payments::PaymentGateway;
use crate::store::{LedgerStore, WebhookStore};

const NOTIFICATION_EVENT: &str = "payment.notification";

/// Translate the gateway's transaction status into a donation status.
///
/// A card capture only counts once the fraud check accepted it. Unknown
/// statuses stay PENDING so a later delivery can still settle the order.
pub fn map_gateway_status(transaction_status: &str, fraud_status: Option<&str>) -> DonationStatus {
    match transaction_status {
        "capture" => match fraud_status {
            Some("accept") => DonationStatus::Success,
            _ => DonationStatus::Pending,
        },
        "settlement" => DonationStatus::Success,
        "cancel" | "deny" | "expire" => DonationStatus::Failed,
        "pending" => DonationStatus::Pending,
        _ => DonationStatus::Pending,
    }
}

/// Result of handling one notification delivery
#[derive(Debug, Clone)]
pub enum NotificationOutcome {
    Applied(SettlementOutcome),
    /// The order id matched no donation; acknowledged so the gateway stops retrying
    UnknownOrder { order_id: String },
}

pub struct WebhookReconciler {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    ledger: Arc<DonationLedger>,
}

impl WebhookReconciler {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        ledger: Arc<DonationLedger>,
    ) -> Self {
        Self {
            store,
            gateway,
            ledger,
        }
    }

    /// Audit, authenticate and apply one gateway notification.
    pub async fn handle_notification(&self, raw: serde_json::Value) -> AppResult<NotificationOutcome> {
        let order_hint = raw.get("order_id").and_then(|v| v.as_str()).map(str::to_string);

        let event_id = match self
            .store
            .log_webhook_event(NOTIFICATION_EVENT, self.gateway.name(), order_hint.as_deref(), raw.clone())
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(order_id = ?order_hint, "Failed to record webhook audit event: {}", e);
                None
            }
        };

        let result = self.process(raw).await;

        if let Some(event_id) = event_id {
            let audit = match &result {
                Ok(_) => self.store.mark_webhook_processed(event_id).await,
                Err(e) => self.store.record_webhook_failure(event_id, &e.to_string()).await,
            };
            if let Err(e) = audit {
                warn!(%event_id, "Failed to update webhook audit event: {}", e);
            }
        }

        result
    }

    async fn process(&self, raw: serde_json::Value) -> AppResult<NotificationOutcome> {
        let payload: NotificationPayload =
            serde_json::from_value(raw).map_err(|e| ValidationError::MalformedPayload {
                message: e.to_string(),
            })?;

        if !self.gateway.verify_signature(
            &payload.order_id,
            &payload.status_code,
            &payload.gross_amount,
            &payload.signature_key,
        ) {
            warn!(order_id = %payload.order_id, "Rejected notification with invalid signature");
            return Err(DomainError::InvalidSignature {
                order_id: payload.order_id,
            }
            .into());
        }

        let status = map_gateway_status(&payload.transaction_status, payload.fraud_status.as_deref());
        info!(
            order_id = %payload.order_id,
            transaction_status = %payload.transaction_status,
            fraud_status = ?payload.fraud_status,
            mapped = %status,
            "Processing payment notification"
        );

        match self.ledger.update_donation_status(&payload.order_id, status).await {
            Ok(outcome) => Ok(NotificationOutcome::Applied(outcome)),
            Err(err) if matches!(err.domain(), Some(DomainError::DonationNotFound { .. })) => {
                warn!(order_id = %payload.order_id, "Notification for unknown order acknowledged");
                Ok(NotificationOutcome::UnknownOrder {
                    order_id: payload.order_id,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Settle an order from the gateway's status API after a checkout redirect.
    /// Query parameters from the browser are never trusted for the status.
    pub async fn confirm_redirect(&self, order_id: &str) -> AppResult<DonationStatus> {
        let remote = self.gateway.get_transaction_status(order_id).await?;
        let status = map_gateway_status(&remote.transaction_status, remote.fraud_status.as_deref());
        let outcome = self.ledger.update_donation_status(order_id, status).await?;
        Ok(outcome.donation.status)
    }
}
