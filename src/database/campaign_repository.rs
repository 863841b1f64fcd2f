use crate::database::error::DatabaseError;
use crate::database::text_enum;
use crate::database::transaction::DatabaseTransaction;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnection;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    Active,
    Completed,
    Suspended,
}

text_enum!(CampaignStatus, "campaign" {
    Draft => "DRAFT",
    Active => "ACTIVE",
    Completed => "COMPLETED",
    Suspended => "SUSPENDED",
});

impl CampaignStatus {
    pub fn accepts_donations(&self) -> bool {
        match self {
            CampaignStatus::Active => true,
            CampaignStatus::Draft | CampaignStatus::Completed | CampaignStatus::Suspended => false,
        }
    }
}

/// Campaign entity
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub target_amount: i64,
    /// Running total of SUCCESS donations
    pub collected_amount: i64,
    #[sqlx(try_from = "String")]
    pub status: CampaignStatus,
    pub is_emergency: bool,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Fields supplied when a campaign is created; `collected_amount` always starts at 0
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub creator_id: Uuid,
    pub title: String,
    pub target_amount: i64,
    pub status: CampaignStatus,
    pub is_emergency: bool,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
}

const CAMPAIGN_COLUMNS: &str = "id, creator_id, title, target_amount, collected_amount, status, \
     is_emergency, start_date, end_date, created_at, updated_at";

/// Campaign Repository: campaign rows and the collected-amount running total
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, campaign: &NewCampaign) -> Result<Campaign, DatabaseError> {
        sqlx::query_as::<_, Campaign>(&format!(
            "INSERT INTO campaigns
             (id, creator_id, title, target_amount, collected_amount, status, is_emergency, start_date, end_date)
             VALUES ($1, $2, $3, $4, 0, $5, $6, $7, $8)
             RETURNING {CAMPAIGN_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(campaign.creator_id)
        .bind(&campaign.title)
        .bind(campaign.target_amount)
        .bind(campaign.status.as_str())
        .bind(campaign.is_emergency)
        .bind(campaign.start_date)
        .bind(campaign.end_date)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Campaign>, DatabaseError> {
        sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Read a campaign and hold its row lock until the surrounding transaction ends
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Campaign>, DatabaseError> {
        sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn set_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: CampaignStatus,
    ) -> Result<Campaign, DatabaseError> {
        sqlx::query_as::<_, Campaign>(&format!(
            "UPDATE campaigns SET status = $1, updated_at = NOW() WHERE id = $2
             RETURNING {CAMPAIGN_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("Campaign", id))
    }

    /// Add a settled donation to the running total
    pub async fn add_to_collected(
        conn: &mut PgConnection,
        id: Uuid,
        amount: i64,
    ) -> Result<i64, DatabaseError> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE campaigns SET collected_amount = collected_amount + $1, updated_at = NOW()
             WHERE id = $2 RETURNING collected_amount",
        )
        .bind(amount)
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("Campaign", id))
    }

    /// Overwrite one campaign's total with the sum of its SUCCESS donations.
    /// Returns `None` when the campaign does not exist.
    pub async fn recalculate_one(&self, id: Uuid) -> Result<Option<i64>, DatabaseError> {
        let mut tx = DatabaseTransaction::begin(&self.pool, "campaign_recalculation").await?;
        let collected = Self::recalculate_locked(tx.conn()?, id).await?;
        tx.commit().await?;

        if let Some(amount) = collected {
            info!(campaign_id = %id, collected_amount = amount, "Recalculated collected amount");
        }
        Ok(collected)
    }

    /// Recompute every campaign's total, one locked transaction per campaign.
    /// Returns the number of campaigns updated.
    pub async fn recalculate_all(&self) -> Result<u64, DatabaseError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM campaigns ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let mut updated = 0;
        for id in ids {
            let mut tx = DatabaseTransaction::begin(&self.pool, "campaign_recalculation").await?;
            if Self::recalculate_locked(tx.conn()?, id).await?.is_some() {
                updated += 1;
            }
            tx.commit().await?;
        }

        info!(campaigns = updated, "Recalculated all collected amounts");
        Ok(updated)
    }

    // The SUM runs as its own statement after the row lock is granted, so it
    // sees every settlement that committed while we waited.
    async fn recalculate_locked(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<i64>, DatabaseError> {
        if Self::lock_for_update(&mut *conn, id).await?.is_none() {
            return Ok(None);
        }

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM donations
             WHERE campaign_id = $1 AND status = 'SUCCESS'",
        )
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        sqlx::query_scalar::<_, i64>(
            "UPDATE campaigns SET collected_amount = $1, updated_at = NOW()
             WHERE id = $2 RETURNING collected_amount",
        )
        .bind(total)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
