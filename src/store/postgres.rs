use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    CampaignStore, DonationStore, LedgerStore, ReportStore, StoreResult, WebhookStore,
    WithdrawalStore,
};
use crate::database::campaign_repository::{Campaign, CampaignRepository};
use crate::database::campaign_update_repository::{
    CampaignUpdate, CampaignUpdateRepository, NewCampaignUpdate,
};
use crate::database::donation_repository::{
    Donation, DonationRepository, DonationStatus, NewDonation, SettlementOutcome,
};
use crate::database::report_repository::{ReportRepository, ReviewAction, ReviewResult};
use crate::database::webhook_repository::WebhookRepository;
use crate::database::withdrawal_repository::{
    NewWithdrawal, Withdrawal, WithdrawalAdmission, WithdrawalRepository, WithdrawalStatus,
    WithdrawalTransition,
};
use crate::ledger::balance::CampaignBalance;

#[cfg(feature = "cache")]
use crate::cache::RedisCache;

/// Postgres-backed ledger store composed from the table repositories
pub struct PgStore {
    pool: PgPool,
    campaigns: CampaignRepository,
    donations: DonationRepository,
    withdrawals: WithdrawalRepository,
    updates: CampaignUpdateRepository,
    reports: ReportRepository,
    webhooks: WebhookRepository,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        let donations = DonationRepository::new(pool.clone());
        Self::with_donations(pool, donations)
    }

    /// Cache public donation listings in Redis
    #[cfg(feature = "cache")]
    pub fn with_cache(pool: PgPool, cache: RedisCache) -> Self {
        let donations = DonationRepository::with_cache(pool.clone(), cache);
        Self::with_donations(pool, donations)
    }

    fn with_donations(pool: PgPool, donations: DonationRepository) -> Self {
        Self {
            campaigns: CampaignRepository::new(pool.clone()),
            withdrawals: WithdrawalRepository::new(pool.clone()),
            updates: CampaignUpdateRepository::new(pool.clone()),
            reports: ReportRepository::new(pool.clone()),
            webhooks: WebhookRepository::new(pool.clone()),
            donations,
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CampaignStore for PgStore {
    async fn find_campaign(&self, id: Uuid) -> StoreResult<Option<Campaign>> {
        self.campaigns.find_by_id(id).await
    }

    async fn campaign_balance(&self, id: Uuid) -> StoreResult<Option<CampaignBalance>> {
        self.withdrawals.balance(id).await
    }

    async fn recalculate_campaign(&self, id: Uuid) -> StoreResult<Option<i64>> {
        let collected = self.campaigns.recalculate_one(id).await?;
        if collected.is_some() {
            self.donations.invalidate_listings(Some(id)).await;
        }
        Ok(collected)
    }

    async fn recalculate_all_campaigns(&self) -> StoreResult<u64> {
        let updated = self.campaigns.recalculate_all().await?;
        self.donations.invalidate_listings(None).await;
        Ok(updated)
    }

    async fn append_campaign_update(&self, update: NewCampaignUpdate) -> StoreResult<CampaignUpdate> {
        self.updates.append(&update).await
    }
}

#[async_trait]
impl DonationStore for PgStore {
    async fn insert_donation(&self, donation: NewDonation) -> StoreResult<Donation> {
        self.donations.insert(&donation).await
    }

    async fn find_donation(&self, order_id: &str) -> StoreResult<Option<Donation>> {
        self.donations.find_by_order_id(order_id).await
    }

    async fn apply_donation_status(
        &self,
        order_id: &str,
        status: DonationStatus,
    ) -> StoreResult<Option<SettlementOutcome>> {
        self.donations.apply_status(order_id, status).await
    }

    async fn list_successful_donations(
        &self,
        campaign_id: Uuid,
        limit: i64,
        prayers_only: bool,
    ) -> StoreResult<Vec<Donation>> {
        self.donations
            .list_successful(campaign_id, limit, prayers_only)
            .await
    }
}

#[async_trait]
impl WithdrawalStore for PgStore {
    async fn create_withdrawal_checked(
        &self,
        withdrawal: NewWithdrawal,
    ) -> StoreResult<WithdrawalAdmission> {
        self.withdrawals.create_checked(&withdrawal).await
    }

    async fn transition_withdrawal(
        &self,
        id: Uuid,
        status: WithdrawalStatus,
        processed_by: Uuid,
    ) -> StoreResult<WithdrawalTransition> {
        self.withdrawals.transition(id, status, processed_by).await
    }

    async fn list_withdrawals(&self, campaign_id: Uuid) -> StoreResult<Vec<Withdrawal>> {
        self.withdrawals.list_by_campaign(campaign_id).await
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn review_report(
        &self,
        report_id: Uuid,
        reviewer: Uuid,
        action: ReviewAction,
    ) -> StoreResult<ReviewResult> {
        let result = self.reports.review(report_id, reviewer, action).await?;
        if let ReviewResult::Reviewed(ref outcome) = result {
            if action.suspends_campaign() {
                self.donations
                    .invalidate_listings(Some(outcome.report.campaign_id))
                    .await;
            }
        }
        Ok(result)
    }
}

#[async_trait]
impl WebhookStore for PgStore {
    async fn log_webhook_event(
        &self,
        event_type: &str,
        source: &str,
        order_id: Option<&str>,
        payload: serde_json::Value,
    ) -> StoreResult<Uuid> {
        let event = self
            .webhooks
            .log_event(event_type, source, order_id, payload)
            .await?;
        Ok(event.id)
    }

    async fn mark_webhook_processed(&self, event_id: Uuid) -> StoreResult<()> {
        self.webhooks.mark_processed(event_id).await
    }

    async fn record_webhook_failure(&self, event_id: Uuid, error: &str) -> StoreResult<()> {
        self.webhooks.record_failure(event_id, error).await
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        crate::database::health_check(&self.pool).await
    }
}
