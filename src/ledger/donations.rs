use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::donation_repository::{Donation, DonationStatus, NewDonation, SettlementOutcome};
use crate::error::{AppResult, DomainError, ValidationError};
use crate::payments::types::{CustomerDetails, ItemDetail, TransactionRequest};
use crate::payments::PaymentGateway;
use crate::store::{CampaignStore, DonationStore, LedgerStore};

/// Donor name shown for anonymous donations on every public read path
pub const ANONYMOUS_DONOR: &str = "Anonymous";

pub const DEFAULT_LIST_LIMIT: i64 = 10;
pub const MAX_LIST_LIMIT: i64 = 100;

/// `DON-{unix_millis}-{12 hex chars}`
pub fn generate_order_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("DON-{}-{}", Utc::now().timestamp_millis(), &suffix[..12])
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+$").ok())
        .as_ref()
}

fn is_valid_email(email: &str) -> bool {
    match email_pattern() {
        Some(pattern) => pattern.is_match(email),
        None => email.contains('@'),
    }
}

/// Pledge submitted by a donor
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDonation {
    pub campaign_id: Uuid,
    pub donor_name: String,
    pub donor_email: String,
    #[serde(default)]
    pub donor_phone: Option<String>,
    pub amount: i64,
    #[serde(default)]
    pub prayer: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationCheckout {
    pub donation_id: Uuid,
    pub order_id: String,
    pub token: String,
    pub redirect_url: String,
}

/// Donation as shown on public campaign pages. Contact fields never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDonation {
    pub id: Uuid,
    pub donor_name: String,
    pub amount: i64,
    pub prayer: Option<String>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Donation> for PublicDonation {
    fn from(donation: Donation) -> Self {
        let donor_name = if donation.is_anonymous {
            ANONYMOUS_DONOR.to_string()
        } else {
            donation.donor_name
        };

        Self {
            id: donation.id,
            donor_name,
            amount: donation.amount,
            prayer: donation.prayer,
            is_anonymous: donation.is_anonymous,
            created_at: donation.created_at,
        }
    }
}

/// Status page projection for a single order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationStatusView {
    pub order_id: String,
    pub campaign_id: Uuid,
    pub amount: i64,
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Donation> for DonationStatusView {
    fn from(donation: Donation) -> Self {
        Self {
            order_id: donation.order_id,
            campaign_id: donation.campaign_id,
            amount: donation.amount,
            status: donation.status,
            created_at: donation.created_at,
            updated_at: donation.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DonationSettings {
    pub min_amount: i64,
    /// Passed to the gateway as the post-checkout landing page
    pub finish_url: Option<String>,
}

impl Default for DonationSettings {
    fn default() -> Self {
        Self {
            min_amount: 10_000,
            finish_url: None,
        }
    }
}

pub struct DonationLedger {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    settings: DonationSettings,
}

impl DonationLedger {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        settings: DonationSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    fn validate(&self, request: &CreateDonation) -> AppResult<()> {
        if request.donor_name.trim().is_empty() {
            return Err(ValidationError::field("donorName", "must not be empty").into());
        }
        if !is_valid_email(request.donor_email.trim()) {
            return Err(ValidationError::field("donorEmail", "must be a valid email address").into());
        }
        if request.amount < self.settings.min_amount {
            return Err(ValidationError::AmountBelowMinimum {
                minimum: self.settings.min_amount,
                actual: request.amount,
            }
            .into());
        }
        Ok(())
    }

    /// Open a gateway checkout and record the PENDING donation.
    ///
    /// The row is written only after the gateway returned a token, so a
    /// gateway failure leaves nothing behind. No balance changes here.
    pub async fn create_donation(
        &self,
        request: CreateDonation,
        user_id: Option<Uuid>,
    ) -> AppResult<DonationCheckout> {
        self.validate(&request)?;

        let campaign = self
            .store
            .find_campaign(request.campaign_id)
            .await?
            .ok_or(DomainError::CampaignNotFound {
                campaign_id: request.campaign_id,
            })?;

        if !campaign.status.accepts_donations() {
            return Err(DomainError::CampaignNotAcceptingDonations {
                campaign_id: campaign.id,
                status: campaign.status,
            }
            .into());
        }

        let order_id = generate_order_id();
        let donor_phone = request
            .donor_phone
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty());
        let prayer = request
            .prayer
            .map(|prayer| prayer.trim().to_string())
            .filter(|prayer| !prayer.is_empty());

        let session = self
            .gateway
            .create_transaction(TransactionRequest {
                order_id: order_id.clone(),
                amount: request.amount,
                customer: CustomerDetails {
                    first_name: request.donor_name.trim().to_string(),
                    email: request.donor_email.trim().to_string(),
                    phone: donor_phone.clone(),
                },
                items: vec![ItemDetail {
                    id: campaign.id.to_string(),
                    name: campaign.title.chars().take(50).collect(),
                    price: request.amount,
                    quantity: 1,
                }],
                finish_url: self.settings.finish_url.clone(),
            })
            .await?;

        let donation = self
            .store
            .insert_donation(NewDonation {
                campaign_id: campaign.id,
                user_id,
                donor_name: request.donor_name.trim().to_string(),
                donor_email: request.donor_email.trim().to_string(),
                donor_phone,
                amount: request.amount,
                prayer,
                is_anonymous: request.is_anonymous,
                order_id: order_id.clone(),
                checkout_token: session.token.clone(),
            })
            .await?;

        info!(
            order_id = %donation.order_id,
            campaign_id = %campaign.id,
            amount = donation.amount,
            "Donation created"
        );

        Ok(DonationCheckout {
            donation_id: donation.id,
            order_id,
            token: session.token,
            redirect_url: session.redirect_url,
        })
    }

    /// Apply a gateway-reported status; credits the campaign only on the
    /// first transition into SUCCESS.
    pub async fn update_donation_status(
        &self,
        order_id: &str,
        status: DonationStatus,
    ) -> AppResult<SettlementOutcome> {
        let outcome = self
            .store
            .apply_donation_status(order_id, status)
            .await?
            .ok_or_else(|| DomainError::DonationNotFound {
                order_id: order_id.to_string(),
            })?;

        if outcome.previous_status == DonationStatus::Success && status != DonationStatus::Success {
            warn!(order_id, requested = %status, "Settled donation kept its SUCCESS status");
        }

        info!(
            order_id,
            previous = %outcome.previous_status,
            current = %outcome.donation.status,
            credited = outcome.credited,
            "Donation status applied"
        );
        Ok(outcome)
    }

    pub async fn find_donation(&self, order_id: &str) -> AppResult<DonationStatusView> {
        self.store
            .find_donation(order_id)
            .await?
            .map(DonationStatusView::from)
            .ok_or_else(|| {
                DomainError::DonationNotFound {
                    order_id: order_id.to_string(),
                }
                .into()
            })
    }

    pub async fn get_campaign_donations(
        &self,
        campaign_id: Uuid,
        limit: Option<i64>,
    ) -> AppResult<Vec<PublicDonation>> {
        self.public_listing(campaign_id, limit, false).await
    }

    pub async fn get_campaign_prayers(
        &self,
        campaign_id: Uuid,
        limit: Option<i64>,
    ) -> AppResult<Vec<PublicDonation>> {
        self.public_listing(campaign_id, limit, true).await
    }

    async fn public_listing(
        &self,
        campaign_id: Uuid,
        limit: Option<i64>,
        prayers_only: bool,
    ) -> AppResult<Vec<PublicDonation>> {
        let donations = self
            .store
            .list_successful_donations(campaign_id, clamp_limit(limit), prayers_only)
            .await?;
        Ok(donations.into_iter().map(PublicDonation::from).collect())
    }

    /// Rebuild every campaign's collected amount from its SUCCESS donations
    pub async fn recalculate_collected_amounts(&self) -> AppResult<u64> {
        let updated = self.store.recalculate_all_campaigns().await?;
        info!(updated, "Recalculated collected amounts");
        Ok(updated)
    }

    pub async fn recalculate_single_campaign(&self, campaign_id: Uuid) -> AppResult<i64> {
        self.store
            .recalculate_campaign(campaign_id)
            .await?
            .ok_or_else(|| DomainError::CampaignNotFound { campaign_id }.into())
    }
}
