use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CampaignStore, DonationStore, LedgerStore, ReportStore, StoreResult, WebhookStore,
    WithdrawalStore,
};
use crate::database::campaign_repository::{Campaign, CampaignStatus, NewCampaign};
use crate::database::campaign_update_repository::{CampaignUpdate, NewCampaignUpdate};
use crate::database::donation_repository::{
    Donation, DonationStatus, NewDonation, SettlementOutcome,
};
use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::report_repository::{
    NewReport, Report, ReportStatus, ReviewAction, ReviewOutcome, ReviewResult,
};
use crate::database::user_repository::User;
use crate::database::webhook_repository::WebhookEvent;
use crate::database::withdrawal_repository::{
    NewWithdrawal, Withdrawal, WithdrawalAdmission, WithdrawalStatus, WithdrawalTransition,
};
use crate::ledger::balance::CampaignBalance;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    campaigns: HashMap<Uuid, Campaign>,
    /// Insertion order doubles as creation order
    donations: Vec<Donation>,
    withdrawals: Vec<Withdrawal>,
    updates: Vec<CampaignUpdate>,
    reports: HashMap<Uuid, Report>,
    webhook_events: Vec<WebhookEvent>,
}

impl State {
    fn withdrawn_total(&self, campaign_id: Uuid) -> i64 {
        self.withdrawals
            .iter()
            .filter(|w| w.campaign_id == campaign_id && w.status.holds_funds())
            .map(|w| w.amount)
            .sum()
    }

    fn success_total(&self, campaign_id: Uuid) -> i64 {
        self.donations
            .iter()
            .filter(|d| d.campaign_id == campaign_id && d.status == DonationStatus::Success)
            .map(|d| d.amount)
            .sum()
    }
}

/// Process-local ledger store. Each call holds one lock for its whole
/// duration, which gives the same atomicity as a Postgres transaction.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    fail_campaign_updates: AtomicBool,
    fail_webhook_log: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_user(&self, name: &str, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            warning_count: 0,
            created_at: Utc::now(),
        };
        self.state.lock().await.users.insert(user.id, user.clone());
        user
    }

    pub async fn seed_campaign(&self, campaign: NewCampaign) -> Campaign {
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            creator_id: campaign.creator_id,
            title: campaign.title,
            target_amount: campaign.target_amount,
            collected_amount: 0,
            status: campaign.status,
            is_emergency: campaign.is_emergency,
            start_date: campaign.start_date,
            end_date: campaign.end_date,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .campaigns
            .insert(campaign.id, campaign.clone());
        campaign
    }

    pub async fn seed_report(&self, report: NewReport) -> Report {
        let report = Report {
            id: Uuid::new_v4(),
            campaign_id: report.campaign_id,
            reporter_name: report.reporter_name,
            reporter_email: report.reporter_email,
            reason: report.reason,
            description: report.description,
            status: ReportStatus::Pending,
            reviewed_by: None,
            created_at: Utc::now(),
            reviewed_at: None,
        };
        self.state.lock().await.reports.insert(report.id, report.clone());
        report
    }

    /// Force a campaign total, simulating drift that recalculation repairs
    pub async fn set_collected_amount(&self, campaign_id: Uuid, amount: i64) {
        if let Some(campaign) = self.state.lock().await.campaigns.get_mut(&campaign_id) {
            campaign.collected_amount = amount;
        }
    }

    pub async fn user(&self, id: Uuid) -> Option<User> {
        self.state.lock().await.users.get(&id).cloned()
    }

    pub async fn report(&self, id: Uuid) -> Option<Report> {
        self.state.lock().await.reports.get(&id).cloned()
    }

    pub async fn campaign_updates(&self, campaign_id: Uuid) -> Vec<CampaignUpdate> {
        self.state
            .lock()
            .await
            .updates
            .iter()
            .filter(|u| u.campaign_id == campaign_id)
            .cloned()
            .collect()
    }

    pub async fn webhook_events(&self) -> Vec<WebhookEvent> {
        self.state.lock().await.webhook_events.clone()
    }

    pub fn fail_campaign_updates(&self, fail: bool) {
        self.fail_campaign_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_webhook_log(&self, fail: bool) {
        self.fail_webhook_log.store(fail, Ordering::SeqCst);
    }

    fn injected_failure(context: &str) -> DatabaseError {
        DatabaseError::new(DatabaseErrorKind::ConnectionError {
            message: "injected failure".to_string(),
        })
        .with_context(context)
    }
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn find_campaign(&self, id: Uuid) -> StoreResult<Option<Campaign>> {
        Ok(self.state.lock().await.campaigns.get(&id).cloned())
    }

    async fn campaign_balance(&self, id: Uuid) -> StoreResult<Option<CampaignBalance>> {
        let state = self.state.lock().await;
        Ok(state
            .campaigns
            .get(&id)
            .map(|c| CampaignBalance::from_totals(c.collected_amount, state.withdrawn_total(id))))
    }

    async fn recalculate_campaign(&self, id: Uuid) -> StoreResult<Option<i64>> {
        let mut state = self.state.lock().await;
        let total = state.success_total(id);
        Ok(state.campaigns.get_mut(&id).map(|campaign| {
            campaign.collected_amount = total;
            campaign.updated_at = Utc::now();
            total
        }))
    }

    async fn recalculate_all_campaigns(&self) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let totals: Vec<(Uuid, i64)> = state
            .campaigns
            .keys()
            .map(|id| (*id, state.success_total(*id)))
            .collect();

        for (id, total) in &totals {
            if let Some(campaign) = state.campaigns.get_mut(id) {
                campaign.collected_amount = *total;
                campaign.updated_at = Utc::now();
            }
        }
        Ok(totals.len() as u64)
    }

    async fn append_campaign_update(&self, update: NewCampaignUpdate) -> StoreResult<CampaignUpdate> {
        if self.fail_campaign_updates.load(Ordering::SeqCst) {
            return Err(Self::injected_failure("append_campaign_update"));
        }

        let update = CampaignUpdate {
            id: Uuid::new_v4(),
            campaign_id: update.campaign_id,
            title: update.title,
            body: update.body,
            is_system: update.is_system,
            created_at: Utc::now(),
        };
        self.state.lock().await.updates.push(update.clone());
        Ok(update)
    }
}

#[async_trait]
impl DonationStore for InMemoryStore {
    async fn insert_donation(&self, donation: NewDonation) -> StoreResult<Donation> {
        let mut state = self.state.lock().await;

        if state.donations.iter().any(|d| d.order_id == donation.order_id) {
            return Err(DatabaseError::new(DatabaseErrorKind::UniqueConstraintViolation {
                constraint: "donations_order_id_unique".to_string(),
            }));
        }
        if !state.campaigns.contains_key(&donation.campaign_id) {
            return Err(DatabaseError::new(DatabaseErrorKind::ForeignKeyViolation {
                constraint: "donations_campaign_id_fkey".to_string(),
            }));
        }

        let now = Utc::now();
        let donation = Donation {
            id: Uuid::new_v4(),
            campaign_id: donation.campaign_id,
            user_id: donation.user_id,
            donor_name: donation.donor_name,
            donor_email: donation.donor_email,
            donor_phone: donation.donor_phone,
            amount: donation.amount,
            prayer: donation.prayer,
            is_anonymous: donation.is_anonymous,
            status: DonationStatus::Pending,
            order_id: donation.order_id,
            checkout_token: Some(donation.checkout_token),
            created_at: now,
            updated_at: now,
        };
        state.donations.push(donation.clone());
        Ok(donation)
    }

    async fn find_donation(&self, order_id: &str) -> StoreResult<Option<Donation>> {
        Ok(self
            .state
            .lock()
            .await
            .donations
            .iter()
            .find(|d| d.order_id == order_id)
            .cloned())
    }

    async fn apply_donation_status(
        &self,
        order_id: &str,
        status: DonationStatus,
    ) -> StoreResult<Option<SettlementOutcome>> {
        let mut state = self.state.lock().await;

        let Some(index) = state.donations.iter().position(|d| d.order_id == order_id) else {
            return Ok(None);
        };

        let previous_status = state.donations[index].status;
        let campaign_id = state.donations[index].campaign_id;
        let change = previous_status.transition_to(status);
        if change.credit && !state.campaigns.contains_key(&campaign_id) {
            return Err(DatabaseError::not_found("Campaign", campaign_id));
        }

        let now = Utc::now();
        let donation = &mut state.donations[index];
        if change.next != previous_status {
            donation.status = change.next;
            donation.updated_at = now;
        }
        let donation = donation.clone();

        if change.credit {
            if let Some(campaign) = state.campaigns.get_mut(&campaign_id) {
                campaign.collected_amount += donation.amount;
                campaign.updated_at = now;
            }
        }

        Ok(Some(SettlementOutcome {
            donation,
            previous_status,
            credited: change.credit,
        }))
    }

    async fn list_successful_donations(
        &self,
        campaign_id: Uuid,
        limit: i64,
        prayers_only: bool,
    ) -> StoreResult<Vec<Donation>> {
        let state = self.state.lock().await;
        Ok(state
            .donations
            .iter()
            .rev()
            .filter(|d| d.campaign_id == campaign_id && d.status == DonationStatus::Success)
            .filter(|d| {
                !prayers_only
                    || d.prayer
                        .as_deref()
                        .map(|p| !p.trim().is_empty())
                        .unwrap_or(false)
            })
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WithdrawalStore for InMemoryStore {
    async fn create_withdrawal_checked(
        &self,
        withdrawal: NewWithdrawal,
    ) -> StoreResult<WithdrawalAdmission> {
        let mut state = self.state.lock().await;

        let Some(collected) = state
            .campaigns
            .get(&withdrawal.campaign_id)
            .map(|c| c.collected_amount)
        else {
            return Ok(WithdrawalAdmission::CampaignNotFound);
        };

        let balance =
            CampaignBalance::from_totals(collected, state.withdrawn_total(withdrawal.campaign_id));
        if !balance.admits(withdrawal.amount) {
            return Ok(WithdrawalAdmission::Rejected(balance));
        }

        let now = Utc::now();
        let created = Withdrawal {
            id: Uuid::new_v4(),
            campaign_id: withdrawal.campaign_id,
            amount: withdrawal.amount,
            note: withdrawal.note,
            status: WithdrawalStatus::Processing,
            processed_by: withdrawal.processed_by,
            created_at: now,
            updated_at: now,
        };
        state.withdrawals.push(created.clone());
        Ok(WithdrawalAdmission::Accepted(created))
    }

    async fn transition_withdrawal(
        &self,
        id: Uuid,
        status: WithdrawalStatus,
        processed_by: Uuid,
    ) -> StoreResult<WithdrawalTransition> {
        let mut state = self.state.lock().await;

        let Some(withdrawal) = state.withdrawals.iter_mut().find(|w| w.id == id) else {
            return Ok(WithdrawalTransition::NotFound);
        };

        if withdrawal.status != WithdrawalStatus::Processing {
            return Ok(WithdrawalTransition::AlreadyFinal(withdrawal.clone()));
        }

        withdrawal.status = status;
        withdrawal.processed_by = processed_by;
        withdrawal.updated_at = Utc::now();
        Ok(WithdrawalTransition::Updated(withdrawal.clone()))
    }

    async fn list_withdrawals(&self, campaign_id: Uuid) -> StoreResult<Vec<Withdrawal>> {
        Ok(self
            .state
            .lock()
            .await
            .withdrawals
            .iter()
            .rev()
            .filter(|w| w.campaign_id == campaign_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn review_report(
        &self,
        report_id: Uuid,
        reviewer: Uuid,
        action: ReviewAction,
    ) -> StoreResult<ReviewResult> {
        let mut state = self.state.lock().await;

        let Some(report) = state.reports.get(&report_id).cloned() else {
            return Ok(ReviewResult::NotFound);
        };
        if report.status != ReportStatus::Pending {
            return Ok(ReviewResult::AlreadyReviewed(report));
        }

        let campaign = state
            .campaigns
            .get(&report.campaign_id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("Campaign", report.campaign_id))?;

        // Validate every row before mutating so a missing creator leaves nothing half-applied
        if action.warns_creator() && !state.users.contains_key(&campaign.creator_id) {
            return Err(DatabaseError::not_found("User", campaign.creator_id));
        }

        let warning_count = if action.warns_creator() {
            state.users.get_mut(&campaign.creator_id).map(|user| {
                user.warning_count += 1;
                user.warning_count
            })
        } else {
            None
        };

        if action.suspends_campaign() {
            if let Some(campaign) = state.campaigns.get_mut(&campaign.id) {
                campaign.status = CampaignStatus::Suspended;
                campaign.updated_at = Utc::now();
            }
        }

        let report = state
            .reports
            .get_mut(&report_id)
            .map(|report| {
                report.status = action.resulting_status();
                report.reviewed_by = Some(reviewer);
                report.reviewed_at = Some(Utc::now());
                report.clone()
            })
            .ok_or_else(|| DatabaseError::not_found("Report", report_id))?;

        Ok(ReviewResult::Reviewed(ReviewOutcome {
            report,
            action,
            creator_id: campaign.creator_id,
            campaign_title: campaign.title,
            warning_count,
        }))
    }
}

#[async_trait]
impl WebhookStore for InMemoryStore {
    async fn log_webhook_event(
        &self,
        event_type: &str,
        source: &str,
        order_id: Option<&str>,
        payload: serde_json::Value,
    ) -> StoreResult<Uuid> {
        if self.fail_webhook_log.load(Ordering::SeqCst) {
            return Err(Self::injected_failure("log_webhook_event"));
        }

        let event = WebhookEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            source: source.to_string(),
            order_id: order_id.map(str::to_string),
            payload,
            processed: false,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        let id = event.id;
        self.state.lock().await.webhook_events.push(event);
        Ok(id)
    }

    async fn mark_webhook_processed(&self, event_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(event) = state.webhook_events.iter_mut().find(|e| e.id == event_id) {
            event.processed = true;
            event.attempts += 1;
            event.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn record_webhook_failure(&self, event_id: Uuid, error: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(event) = state.webhook_events.iter_mut().find(|e| e.id == event_id) {
            event.attempts += 1;
            event.last_error = Some(error.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn active_campaign(store: &InMemoryStore) -> Campaign {
        let creator = store.seed_user("Creator", "creator@example.com").await;
        store
            .seed_campaign(NewCampaign {
                creator_id: creator.id,
                title: "Flood relief".to_string(),
                target_amount: 1_000_000,
                status: CampaignStatus::Active,
                is_emergency: true,
                start_date: None,
                end_date: None,
            })
            .await
    }

    fn pledge(campaign_id: Uuid, order_id: &str, amount: i64) -> NewDonation {
        NewDonation {
            campaign_id,
            user_id: None,
            donor_name: "Budi".to_string(),
            donor_email: "budi@example.com".to_string(),
            donor_phone: None,
            amount,
            prayer: None,
            is_anonymous: false,
            order_id: order_id.to_string(),
            checkout_token: "snap-token".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failed_credit_leaves_donation_unchanged() {
        let store = InMemoryStore::new();
        let campaign = active_campaign(&store).await;
        store.insert_donation(pledge(campaign.id, "DON-9", 10_000)).await.unwrap();
        store.state.lock().await.campaigns.remove(&campaign.id);

        let result = store
            .apply_donation_status("DON-9", DonationStatus::Success)
            .await;
        assert!(result.is_err());

        let donation = store.find_donation("DON-9").await.unwrap().unwrap();
        assert_eq!(donation.status, DonationStatus::Pending);
    }

    #[tokio::test]
    async fn test_duplicate_order_id_is_a_unique_violation() {
        let store = InMemoryStore::new();
        let campaign = active_campaign(&store).await;

        store.insert_donation(pledge(campaign.id, "DON-1", 10_000)).await.unwrap();
        let err = store
            .insert_donation(pledge(campaign.id, "DON-1", 10_000))
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_settlement_credits_once() {
        let store = InMemoryStore::new();
        let campaign = active_campaign(&store).await;
        store.insert_donation(pledge(campaign.id, "DON-2", 25_000)).await.unwrap();

        let first = store
            .apply_donation_status("DON-2", DonationStatus::Success)
            .await
            .unwrap()
            .unwrap();
        let second = store
            .apply_donation_status("DON-2", DonationStatus::Success)
            .await
            .unwrap()
            .unwrap();

        assert!(first.credited);
        assert!(!second.credited);
        let campaign = store.find_campaign(campaign.id).await.unwrap().unwrap();
        assert_eq!(campaign.collected_amount, 25_000);
    }

    #[tokio::test]
    async fn test_settle_unknown_order_returns_none() {
        let store = InMemoryStore::new();
        assert!(store
            .apply_donation_status("DON-missing", DonationStatus::Success)
            .await
            .unwrap()
            .is_none());
    }
}
