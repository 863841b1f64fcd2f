//! Persistence ports used by the ledger services.
//!
//! Every operation that moves money is a single atomic call on the port:
//! implementations must not let two concurrent calls observe the same
//! intermediate state. [`PgStore`] does this with row locks inside one
//! transaction; the in-memory test store holds one mutex for the whole call.

use async_trait::async_trait;
use uuid::Uuid;

use crate::database::campaign_repository::Campaign;
use crate::database::campaign_update_repository::{CampaignUpdate, NewCampaignUpdate};
use crate::database::donation_repository::{Donation, DonationStatus, NewDonation, SettlementOutcome};
use crate::database::error::DatabaseError;
use crate::database::report_repository::{ReviewAction, ReviewResult};
use crate::database::withdrawal_repository::{
    NewWithdrawal, Withdrawal, WithdrawalAdmission, WithdrawalStatus, WithdrawalTransition,
};
use crate::ledger::balance::CampaignBalance;

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[cfg(test)]
pub use memory::InMemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, DatabaseError>;

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn find_campaign(&self, id: Uuid) -> StoreResult<Option<Campaign>>;

    /// `None` when the campaign does not exist
    async fn campaign_balance(&self, id: Uuid) -> StoreResult<Option<CampaignBalance>>;

    /// Overwrite one campaign's total from its SUCCESS donations
    async fn recalculate_campaign(&self, id: Uuid) -> StoreResult<Option<i64>>;

    /// Overwrite every campaign's total, returning how many were updated
    async fn recalculate_all_campaigns(&self) -> StoreResult<u64>;

    async fn append_campaign_update(&self, update: NewCampaignUpdate) -> StoreResult<CampaignUpdate>;
}

#[async_trait]
pub trait DonationStore: Send + Sync {
    async fn insert_donation(&self, donation: NewDonation) -> StoreResult<Donation>;

    async fn find_donation(&self, order_id: &str) -> StoreResult<Option<Donation>>;

    /// Atomically apply a status and credit the campaign on the first
    /// transition into SUCCESS. `None` for an unknown order id.
    async fn apply_donation_status(
        &self,
        order_id: &str,
        status: DonationStatus,
    ) -> StoreResult<Option<SettlementOutcome>>;

    async fn list_successful_donations(
        &self,
        campaign_id: Uuid,
        limit: i64,
        prayers_only: bool,
    ) -> StoreResult<Vec<Donation>>;
}

#[async_trait]
pub trait WithdrawalStore: Send + Sync {
    /// Check available funds and insert a PROCESSING withdrawal as one step
    async fn create_withdrawal_checked(&self, withdrawal: NewWithdrawal)
        -> StoreResult<WithdrawalAdmission>;

    /// Move a PROCESSING withdrawal to `status`; anything else is left alone
    async fn transition_withdrawal(
        &self,
        id: Uuid,
        status: WithdrawalStatus,
        processed_by: Uuid,
    ) -> StoreResult<WithdrawalTransition>;

    async fn list_withdrawals(&self, campaign_id: Uuid) -> StoreResult<Vec<Withdrawal>>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn review_report(
        &self,
        report_id: Uuid,
        reviewer: Uuid,
        action: ReviewAction,
    ) -> StoreResult<ReviewResult>;
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Record an inbound delivery, returning the audit row id
    async fn log_webhook_event(
        &self,
        event_type: &str,
        source: &str,
        order_id: Option<&str>,
        payload: serde_json::Value,
    ) -> StoreResult<Uuid>;

    async fn mark_webhook_processed(&self, event_id: Uuid) -> StoreResult<()>;

    async fn record_webhook_failure(&self, event_id: Uuid, error: &str) -> StoreResult<()>;
}

/// Everything the ledger needs from persistence
#[async_trait]
pub trait LedgerStore:
    CampaignStore + DonationStore + WithdrawalStore + ReportStore + WebhookStore
{
    async fn health_check(&self) -> StoreResult<()>;
}
