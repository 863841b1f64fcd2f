use crate::database::campaign_repository::{CampaignRepository, CampaignStatus};
use crate::database::error::DatabaseError;
use crate::database::text_enum;
use crate::database::transaction::DatabaseTransaction;
use crate::database::user_repository::UserRepository;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Rejected,
}

text_enum!(ReportStatus, "report" {
    Pending => "PENDING",
    Reviewed => "REVIEWED",
    Rejected => "REJECTED",
});

/// Administrator decision on a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    Dismiss,
    Warning,
    Suspend,
}

impl ReviewAction {
    pub fn resulting_status(&self) -> ReportStatus {
        match self {
            ReviewAction::Dismiss => ReportStatus::Rejected,
            ReviewAction::Warning | ReviewAction::Suspend => ReportStatus::Reviewed,
        }
    }

    pub fn warns_creator(&self) -> bool {
        match self {
            ReviewAction::Dismiss => false,
            ReviewAction::Warning | ReviewAction::Suspend => true,
        }
    }

    pub fn suspends_campaign(&self) -> bool {
        match self {
            ReviewAction::Suspend => true,
            ReviewAction::Dismiss | ReviewAction::Warning => false,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub reporter_name: String,
    pub reporter_email: String,
    pub reason: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ReportStatus,
    pub reviewed_by: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub reviewed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub campaign_id: Uuid,
    pub reporter_name: String,
    pub reporter_email: String,
    pub reason: String,
    pub description: Option<String>,
}

/// What a committed review changed
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub report: Report,
    pub action: ReviewAction,
    pub creator_id: Uuid,
    pub campaign_title: String,
    /// Creator's warning count after the review, when it was bumped
    pub warning_count: Option<i32>,
}

#[derive(Debug, Clone)]
pub enum ReviewResult {
    Reviewed(ReviewOutcome),
    AlreadyReviewed(Report),
    NotFound,
}

const REPORT_COLUMNS: &str = "id, campaign_id, reporter_name, reporter_email, reason, description, \
     status, reviewed_by, created_at, reviewed_at";

pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, report: &NewReport) -> Result<Report, DatabaseError> {
        sqlx::query_as::<_, Report>(&format!(
            "INSERT INTO reports (id, campaign_id, reporter_name, reporter_email, reason, description)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {REPORT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(report.campaign_id)
        .bind(&report.reporter_name)
        .bind(&report.reporter_email)
        .bind(&report.reason)
        .bind(&report.description)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>, DatabaseError> {
        sqlx::query_as::<_, Report>(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Apply a review and its side effects (creator warning, campaign
    /// suspension) atomically. Only PENDING reports can be reviewed.
    pub async fn review(
        &self,
        report_id: Uuid,
        reviewer: Uuid,
        action: ReviewAction,
    ) -> Result<ReviewResult, DatabaseError> {
        let mut tx = DatabaseTransaction::begin(&self.pool, "report_review").await?;

        let report = sqlx::query_as::<_, Report>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1 FOR UPDATE"
        ))
        .bind(report_id)
        .fetch_optional(tx.conn()?)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some(report) = report else {
            tx.rollback().await?;
            return Ok(ReviewResult::NotFound);
        };

        if report.status != ReportStatus::Pending {
            tx.rollback().await?;
            return Ok(ReviewResult::AlreadyReviewed(report));
        }

        let campaign = CampaignRepository::lock_for_update(tx.conn()?, report.campaign_id)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Campaign", report.campaign_id))?;

        let warning_count = if action.warns_creator() {
            Some(UserRepository::increment_warnings(tx.conn()?, campaign.creator_id).await?)
        } else {
            None
        };

        if action.suspends_campaign() {
            CampaignRepository::set_status(tx.conn()?, campaign.id, CampaignStatus::Suspended).await?;
        }

        let report = sqlx::query_as::<_, Report>(&format!(
            "UPDATE reports SET status = $1, reviewed_by = $2, reviewed_at = NOW()
             WHERE id = $3
             RETURNING {REPORT_COLUMNS}"
        ))
        .bind(action.resulting_status().as_str())
        .bind(reviewer)
        .bind(report_id)
        .fetch_one(tx.conn()?)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await?;

        info!(
            report_id = %report.id,
            campaign_id = %campaign.id,
            action = ?action,
            "Report reviewed"
        );

        Ok(ReviewResult::Reviewed(ReviewOutcome {
            report,
            action,
            creator_id: campaign.creator_id,
            campaign_title: campaign.title,
            warning_count,
        }))
    }
}
