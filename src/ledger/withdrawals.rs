use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::campaign_repository::Campaign;
use crate::database::campaign_update_repository::NewCampaignUpdate;
use crate::database::withdrawal_repository::{
    NewWithdrawal, Withdrawal, WithdrawalAdmission, WithdrawalStatus, WithdrawalTransition,
};
use crate::error::{AppResult, DomainError, ValidationError};
use crate::ledger::balance::CampaignBalance;
use crate::ledger::Requester;
use crate::store::{CampaignStore, LedgerStore, WithdrawalStore};

pub const DISBURSEMENT_TITLE: &str = "Fund disbursement";

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWithdrawal {
    pub campaign_id: Uuid,
    pub amount: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Group digits with dots, the way rupiah amounts are written
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn disbursement_body(withdrawal: &Withdrawal) -> String {
    let mut body = format!(
        "Rp {} has been withdrawn from this campaign for disbursement to the beneficiary.",
        format_rupiah(withdrawal.amount)
    );
    if let Some(note) = withdrawal.note.as_deref().filter(|n| !n.trim().is_empty()) {
        body.push_str("\n\n");
        body.push_str(note.trim());
    }
    body
}

pub struct WithdrawalService {
    store: Arc<dyn LedgerStore>,
}

impl WithdrawalService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    async fn campaign_for(&self, requester: &Requester, campaign_id: Uuid) -> AppResult<Campaign> {
        let campaign = self
            .store
            .find_campaign(campaign_id)
            .await?
            .ok_or(DomainError::CampaignNotFound { campaign_id })?;
        requester.require_owner_or_admin(campaign.creator_id)?;
        Ok(campaign)
    }

    pub async fn get_available(
        &self,
        requester: &Requester,
        campaign_id: Uuid,
    ) -> AppResult<CampaignBalance> {
        self.campaign_for(requester, campaign_id).await?;
        self.store
            .campaign_balance(campaign_id)
            .await?
            .ok_or_else(|| DomainError::CampaignNotFound { campaign_id }.into())
    }

    /// Reserve funds for a disbursement.
    ///
    /// The balance check and the insert are one store call, so the sum of
    /// PROCESSING and COMPLETED withdrawals never exceeds what was collected.
    /// The public disbursement note is written afterwards and may fail alone.
    pub async fn request_withdrawal(
        &self,
        requester: &Requester,
        request: CreateWithdrawal,
    ) -> AppResult<Withdrawal> {
        if request.amount <= 0 {
            return Err(ValidationError::field("amount", "must be greater than 0").into());
        }

        let campaign = self.campaign_for(requester, request.campaign_id).await?;

        let admission = self
            .store
            .create_withdrawal_checked(NewWithdrawal {
                campaign_id: campaign.id,
                amount: request.amount,
                note: request.note.filter(|n| !n.trim().is_empty()),
                processed_by: requester.user_id,
            })
            .await?;

        let withdrawal = match admission {
            WithdrawalAdmission::Accepted(withdrawal) => withdrawal,
            WithdrawalAdmission::Rejected(balance) => {
                info!(
                    campaign_id = %campaign.id,
                    requested = request.amount,
                    available = balance.available_amount,
                    "Withdrawal rejected for insufficient funds"
                );
                return Err(DomainError::InsufficientFunds {
                    requested: request.amount,
                    available: balance.available_amount,
                }
                .into());
            }
            WithdrawalAdmission::CampaignNotFound => {
                return Err(DomainError::CampaignNotFound {
                    campaign_id: campaign.id,
                }
                .into())
            }
        };

        let note = NewCampaignUpdate {
            campaign_id: campaign.id,
            title: DISBURSEMENT_TITLE.to_string(),
            body: disbursement_body(&withdrawal),
            is_system: true,
        };
        if let Err(e) = self.store.append_campaign_update(note).await {
            warn!(
                withdrawal_id = %withdrawal.id,
                campaign_id = %campaign.id,
                "Failed to publish disbursement note: {}", e
            );
        }

        Ok(withdrawal)
    }

    /// Settle a PROCESSING withdrawal as COMPLETED or FAILED (admin only)
    pub async fn update_withdrawal_status(
        &self,
        requester: &Requester,
        withdrawal_id: Uuid,
        status: WithdrawalStatus,
    ) -> AppResult<Withdrawal> {
        requester.require_admin()?;

        if !status.is_terminal() {
            return Err(ValidationError::field("status", "must be COMPLETED or FAILED").into());
        }

        match self
            .store
            .transition_withdrawal(withdrawal_id, status, requester.user_id)
            .await?
        {
            WithdrawalTransition::Updated(withdrawal) => {
                info!(%withdrawal_id, status = %status, "Withdrawal status updated");
                Ok(withdrawal)
            }
            WithdrawalTransition::AlreadyFinal(existing) => {
                Err(DomainError::InvalidWithdrawalTransition {
                    from: existing.status,
                    to: status,
                }
                .into())
            }
            WithdrawalTransition::NotFound => {
                Err(DomainError::WithdrawalNotFound { withdrawal_id }.into())
            }
        }
    }

    pub async fn list_campaign_withdrawals(
        &self,
        requester: &Requester,
        campaign_id: Uuid,
    ) -> AppResult<Vec<Withdrawal>> {
        self.campaign_for(requester, campaign_id).await?;
        Ok(self.store.list_withdrawals(campaign_id).await?)
    }
}
