//! Shared fixtures for unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::database::campaign_repository::{Campaign, CampaignStatus, NewCampaign};
use crate::database::donation_repository::{Donation, DonationStatus, NewDonation};
use crate::error::{AppResult, ExternalError};
use crate::ledger::donations::CreateDonation;
use crate::payments::providers::midtrans::compute_signature;
use crate::payments::types::{CheckoutSession, GatewayTransactionStatus, TransactionRequest};
use crate::payments::PaymentGateway;
use crate::store::{DonationStore, InMemoryStore};

pub const TEST_SERVER_KEY: &str = "SB-Mid-server-test-key";

/// Scripted gateway: records checkouts and answers status queries from a map
pub struct FakeGateway {
    pub server_key: String,
    fail_checkouts: AtomicBool,
    created: Mutex<Vec<String>>,
    remote: Mutex<HashMap<String, (String, Option<String>)>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            server_key: TEST_SERVER_KEY.to_string(),
            fail_checkouts: AtomicBool::new(false),
            created: Mutex::new(Vec::new()),
            remote: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_checkouts(&self, fail: bool) {
        self.fail_checkouts.store(fail, Ordering::SeqCst);
    }

    pub fn created_orders(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn set_remote_status(&self, order_id: &str, transaction_status: &str, fraud: Option<&str>) {
        self.remote.lock().unwrap().insert(
            order_id.to_string(),
            (transaction_status.to_string(), fraud.map(str::to_string)),
        );
    }

    pub fn sign(&self, order_id: &str, status_code: &str, gross_amount: &str) -> String {
        compute_signature(order_id, status_code, gross_amount, &self.server_key)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn name(&self) -> &'static str {
        "Fake"
    }

    async fn create_transaction(&self, request: TransactionRequest) -> AppResult<CheckoutSession> {
        if self.fail_checkouts.load(Ordering::SeqCst) || request.amount <= 0 {
            return Err(ExternalError::PaymentProvider {
                provider: "Fake".to_string(),
                message: "checkout refused".to_string(),
                is_retryable: false,
            }
            .into());
        }

        self.created.lock().unwrap().push(request.order_id.clone());
        Ok(CheckoutSession {
            token: format!("tok-{}", request.order_id),
            redirect_url: format!("https://pay.test/{}", request.order_id),
        })
    }

    fn verify_signature(
        &self,
        order_id: &str,
        status_code: &str,
        gross_amount: &str,
        signature: &str,
    ) -> bool {
        self.sign(order_id, status_code, gross_amount) == signature
    }

    async fn get_transaction_status(&self, order_id: &str) -> AppResult<GatewayTransactionStatus> {
        let scripted = self.remote.lock().unwrap().get(order_id).cloned();
        match scripted {
            Some((transaction_status, fraud_status)) => Ok(GatewayTransactionStatus {
                order_id: order_id.to_string(),
                transaction_status,
                fraud_status,
                status_code: "200".to_string(),
                gross_amount: "0.00".to_string(),
            }),
            None => Err(ExternalError::PaymentProvider {
                provider: "Fake".to_string(),
                message: format!("Transaction doesn't exist: {}", order_id),
                is_retryable: false,
            }
            .into()),
        }
    }
}

/// Campaign with a freshly seeded creator
pub async fn seed_campaign(store: &InMemoryStore, status: CampaignStatus) -> Campaign {
    let creator = store.seed_user("Creator", "creator@example.com").await;
    store
        .seed_campaign(NewCampaign {
            creator_id: creator.id,
            title: "Help rebuild the village school".to_string(),
            target_amount: 10_000_000,
            status,
            is_emergency: false,
            start_date: None,
            end_date: None,
        })
        .await
}

/// Insert a donation and settle it, crediting the campaign
pub async fn seed_settled_donation(
    store: &InMemoryStore,
    campaign_id: Uuid,
    order_id: &str,
    amount: i64,
) -> Donation {
    store
        .insert_donation(NewDonation {
            campaign_id,
            user_id: None,
            donor_name: "Donor".to_string(),
            donor_email: "donor@example.com".to_string(),
            donor_phone: None,
            amount,
            prayer: None,
            is_anonymous: false,
            order_id: order_id.to_string(),
            checkout_token: format!("tok-{}", order_id),
        })
        .await
        .unwrap();
    store
        .apply_donation_status(order_id, DonationStatus::Success)
        .await
        .unwrap()
        .unwrap()
        .donation
}

pub fn donation_request(campaign_id: Uuid, amount: i64) -> CreateDonation {
    CreateDonation {
        campaign_id,
        donor_name: "Budi".to_string(),
        donor_email: "donor@example.com".to_string(),
        donor_phone: None,
        amount,
        prayer: None,
        is_anonymous: false,
    }
}

/// Correctly signed notification body
pub fn notification(
    gateway: &FakeGateway,
    order_id: &str,
    transaction_status: &str,
    fraud: Option<&str>,
    gross_amount: &str,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "order_id": order_id,
        "status_code": "200",
        "gross_amount": gross_amount,
        "signature_key": gateway.sign(order_id, "200", gross_amount),
        "transaction_status": transaction_status,
        "payment_type": "bank_transfer",
    });
    if let Some(fraud) = fraud {
        body["fraud_status"] = serde_json::json!(fraud);
    }
    body
}
