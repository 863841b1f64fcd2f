use crate::database::error::DatabaseError;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Public progress note on a campaign
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CampaignUpdate {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub title: String,
    pub body: String,
    /// Generated notes (e.g. disbursements); these cannot be deleted by creators
    pub is_system: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCampaignUpdate {
    pub campaign_id: Uuid,
    pub title: String,
    pub body: String,
    pub is_system: bool,
}

pub struct CampaignUpdateRepository {
    pool: PgPool,
}

impl CampaignUpdateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, update: &NewCampaignUpdate) -> Result<CampaignUpdate, DatabaseError> {
        sqlx::query_as::<_, CampaignUpdate>(
            "INSERT INTO campaign_updates (id, campaign_id, title, body, is_system)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, campaign_id, title, body, is_system, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(update.campaign_id)
        .bind(&update.title)
        .bind(&update.body)
        .bind(update.is_system)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_by_campaign(&self, campaign_id: Uuid) -> Result<Vec<CampaignUpdate>, DatabaseError> {
        sqlx::query_as::<_, CampaignUpdate>(
            "SELECT id, campaign_id, title, body, is_system, created_at FROM campaign_updates
             WHERE campaign_id = $1 ORDER BY created_at DESC",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
