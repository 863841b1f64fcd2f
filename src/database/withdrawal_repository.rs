use crate::database::campaign_repository::CampaignRepository;
use crate::database::error::DatabaseError;
use crate::database::text_enum;
use crate::database::transaction::DatabaseTransaction;
use crate::ledger::balance::CampaignBalance;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnection;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

/// Withdrawal status; PROCESSING moves to exactly one terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Processing,
    Completed,
    Failed,
}

text_enum!(WithdrawalStatus, "withdrawal" {
    Processing => "PROCESSING",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

impl WithdrawalStatus {
    /// Whether the withdrawal still draws against the campaign's funds
    pub fn holds_funds(&self) -> bool {
        match self {
            WithdrawalStatus::Processing | WithdrawalStatus::Completed => true,
            WithdrawalStatus::Failed => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            WithdrawalStatus::Processing => false,
            WithdrawalStatus::Completed | WithdrawalStatus::Failed => true,
        }
    }
}

/// Withdrawal entity
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub amount: i64,
    pub note: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: WithdrawalStatus,
    pub processed_by: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub campaign_id: Uuid,
    pub amount: i64,
    pub note: Option<String>,
    pub processed_by: Uuid,
}

/// Outcome of the balance-checked insert
#[derive(Debug, Clone)]
pub enum WithdrawalAdmission {
    Accepted(Withdrawal),
    Rejected(CampaignBalance),
    CampaignNotFound,
}

/// Outcome of an admin status change
#[derive(Debug, Clone)]
pub enum WithdrawalTransition {
    Updated(Withdrawal),
    AlreadyFinal(Withdrawal),
    NotFound,
}

const WITHDRAWAL_COLUMNS: &str =
    "id, campaign_id, amount, note, status, processed_by, created_at, updated_at";

/// Withdrawal Repository: disbursement requests against collected funds
pub struct WithdrawalRepository {
    pool: PgPool,
}

impl WithdrawalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Sum of PROCESSING and COMPLETED withdrawals for a campaign
    async fn withdrawn_total(conn: &mut PgConnection, campaign_id: Uuid) -> Result<i64, DatabaseError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM withdrawals
             WHERE campaign_id = $1 AND status IN ('PROCESSING', 'COMPLETED')",
        )
        .bind(campaign_id)
        .fetch_one(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn balance(&self, campaign_id: Uuid) -> Result<Option<CampaignBalance>, DatabaseError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;

        let collected = sqlx::query_scalar::<_, i64>(
            "SELECT collected_amount FROM campaigns WHERE id = $1",
        )
        .bind(campaign_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match collected {
            Some(collected) => {
                let withdrawn = Self::withdrawn_total(&mut *conn, campaign_id).await?;
                Ok(Some(CampaignBalance::from_totals(collected, withdrawn)))
            }
            None => Ok(None),
        }
    }

    /// Check the available balance and insert a PROCESSING withdrawal in one
    /// transaction. The campaign row stays locked until commit, so two
    /// concurrent requests cannot both pass the check against the same total.
    pub async fn create_checked(
        &self,
        withdrawal: &NewWithdrawal,
    ) -> Result<WithdrawalAdmission, DatabaseError> {
        let mut tx = DatabaseTransaction::begin(&self.pool, "withdrawal_admission").await?;

        let Some(campaign) = CampaignRepository::lock_for_update(tx.conn()?, withdrawal.campaign_id).await?
        else {
            tx.rollback().await?;
            return Ok(WithdrawalAdmission::CampaignNotFound);
        };

        let withdrawn = Self::withdrawn_total(tx.conn()?, campaign.id).await?;
        let balance = CampaignBalance::from_totals(campaign.collected_amount, withdrawn);

        if !balance.admits(withdrawal.amount) {
            tx.rollback().await?;
            return Ok(WithdrawalAdmission::Rejected(balance));
        }

        let created = sqlx::query_as::<_, Withdrawal>(&format!(
            "INSERT INTO withdrawals (id, campaign_id, amount, note, status, processed_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {WITHDRAWAL_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(withdrawal.campaign_id)
        .bind(withdrawal.amount)
        .bind(&withdrawal.note)
        .bind(WithdrawalStatus::Processing.as_str())
        .bind(withdrawal.processed_by)
        .fetch_one(tx.conn()?)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await?;

        info!(
            withdrawal_id = %created.id,
            campaign_id = %created.campaign_id,
            amount = created.amount,
            "Withdrawal created"
        );
        Ok(WithdrawalAdmission::Accepted(created))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Withdrawal>, DatabaseError> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Move a PROCESSING withdrawal to a terminal status. The guard lives in
    /// the UPDATE itself, so a second admin action cannot overwrite the first.
    pub async fn transition(
        &self,
        id: Uuid,
        status: WithdrawalStatus,
        processed_by: Uuid,
    ) -> Result<WithdrawalTransition, DatabaseError> {
        let updated = sqlx::query_as::<_, Withdrawal>(&format!(
            "UPDATE withdrawals SET status = $1, processed_by = $2, updated_at = NOW()
             WHERE id = $3 AND status = 'PROCESSING'
             RETURNING {WITHDRAWAL_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(processed_by)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if let Some(withdrawal) = updated {
            return Ok(WithdrawalTransition::Updated(withdrawal));
        }

        Ok(match self.find_by_id(id).await? {
            Some(existing) => WithdrawalTransition::AlreadyFinal(existing),
            None => WithdrawalTransition::NotFound,
        })
    }

    pub async fn list_by_campaign(&self, campaign_id: Uuid) -> Result<Vec<Withdrawal>, DatabaseError> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE campaign_id = $1
             ORDER BY created_at DESC"
        ))
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
