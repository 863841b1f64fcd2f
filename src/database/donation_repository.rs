use crate::database::campaign_repository::CampaignRepository;
use crate::database::error::DatabaseError;
use crate::database::text_enum;
use crate::database::transaction::DatabaseTransaction;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

#[cfg(feature = "cache")]
use crate::cache::{keys::campaign::DonationListKey, Cache, RedisCache};
#[cfg(feature = "cache")]
use tracing::debug;

/// Donation payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
    Pending,
    Success,
    Failed,
}

text_enum!(DonationStatus, "donation" {
    Pending => "PENDING",
    Success => "SUCCESS",
    Failed => "FAILED",
});

/// What applying a requested status to a donation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// Status persisted after the update
    pub next: DonationStatus,
    /// Whether the campaign total must grow by the donation amount
    pub credit: bool,
}

impl DonationStatus {
    /// Plan a transition from `self` (the persisted status) to `requested`.
    ///
    /// SUCCESS is terminal: once credited, a donation keeps its status so the
    /// campaign total and the donation row can never disagree. Only the first
    /// move into SUCCESS credits the campaign.
    pub fn transition_to(self, requested: DonationStatus) -> StatusChange {
        match (self, requested) {
            (DonationStatus::Success, _) => StatusChange {
                next: DonationStatus::Success,
                credit: false,
            },
            (DonationStatus::Pending | DonationStatus::Failed, DonationStatus::Success) => {
                StatusChange {
                    next: DonationStatus::Success,
                    credit: true,
                }
            }
            (DonationStatus::Pending | DonationStatus::Failed, next) => StatusChange {
                next,
                credit: false,
            },
        }
    }
}

/// Donation entity
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub user_id: Option<Uuid>,
    pub donor_name: String,
    pub donor_email: String,
    pub donor_phone: Option<String>,
    pub amount: i64,
    pub prayer: Option<String>,
    pub is_anonymous: bool,
    #[sqlx(try_from = "String")]
    pub status: DonationStatus,
    /// Gateway-facing idempotency key
    pub order_id: String,
    pub checkout_token: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A pledge ready to be persisted as PENDING
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub campaign_id: Uuid,
    pub user_id: Option<Uuid>,
    pub donor_name: String,
    pub donor_email: String,
    pub donor_phone: Option<String>,
    pub amount: i64,
    pub prayer: Option<String>,
    pub is_anonymous: bool,
    pub order_id: String,
    pub checkout_token: String,
}

/// Result of an atomic status settlement
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub donation: Donation,
    pub previous_status: DonationStatus,
    pub credited: bool,
}

const DONATION_COLUMNS: &str = "id, campaign_id, user_id, donor_name, donor_email, donor_phone, \
     amount, prayer, is_anonymous, status, order_id, checkout_token, created_at, updated_at";

/// Donation Repository: pledges, settlement and public listings
pub struct DonationRepository {
    pool: PgPool,
    #[cfg(feature = "cache")]
    cache: Option<RedisCache>,
}

impl DonationRepository {
    /// Create a new repository without caching
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            #[cfg(feature = "cache")]
            cache: None,
        }
    }

    /// Create a new repository with Redis caching of public listings
    #[cfg(feature = "cache")]
    pub fn with_cache(pool: PgPool, cache: RedisCache) -> Self {
        Self {
            pool,
            cache: Some(cache),
        }
    }

    pub async fn insert(&self, donation: &NewDonation) -> Result<Donation, DatabaseError> {
        sqlx::query_as::<_, Donation>(&format!(
            "INSERT INTO donations
             (id, campaign_id, user_id, donor_name, donor_email, donor_phone, amount, prayer,
              is_anonymous, status, order_id, checkout_token)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {DONATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(donation.campaign_id)
        .bind(donation.user_id)
        .bind(&donation.donor_name)
        .bind(&donation.donor_email)
        .bind(&donation.donor_phone)
        .bind(donation.amount)
        .bind(&donation.prayer)
        .bind(donation.is_anonymous)
        .bind(DonationStatus::Pending.as_str())
        .bind(&donation.order_id)
        .bind(&donation.checkout_token)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Donation>, DatabaseError> {
        sqlx::query_as::<_, Donation>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Apply a gateway-reported status in one transaction.
    ///
    /// The donation row is locked first, so concurrent webhook and redirect
    /// deliveries for the same order serialize here and the campaign is
    /// credited at most once. Returns `None` for an unknown order id.
    pub async fn apply_status(
        &self,
        order_id: &str,
        requested: DonationStatus,
    ) -> Result<Option<SettlementOutcome>, DatabaseError> {
        let mut tx = DatabaseTransaction::begin(&self.pool, "donation_settlement").await?;

        let current = sqlx::query_as::<_, Donation>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations WHERE order_id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(tx.conn()?)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        let change = current.status.transition_to(requested);
        if current.status == DonationStatus::Success && requested != DonationStatus::Success {
            warn!(
                order_id,
                requested = %requested,
                "Ignoring status downgrade for settled donation"
            );
        }

        let donation = if change.next != current.status {
            sqlx::query_as::<_, Donation>(&format!(
                "UPDATE donations SET status = $1, updated_at = NOW() WHERE id = $2
                 RETURNING {DONATION_COLUMNS}"
            ))
            .bind(change.next.as_str())
            .bind(current.id)
            .fetch_one(tx.conn()?)
            .await
            .map_err(DatabaseError::from_sqlx)?
        } else {
            current.clone()
        };

        if change.credit {
            let collected =
                CampaignRepository::add_to_collected(tx.conn()?, donation.campaign_id, donation.amount)
                    .await?;
            info!(
                order_id,
                campaign_id = %donation.campaign_id,
                amount = donation.amount,
                collected_amount = collected,
                "Credited campaign for settled donation"
            );
        }

        tx.commit().await?;

        if change.credit {
            self.invalidate_listings(Some(donation.campaign_id)).await;
        }

        Ok(Some(SettlementOutcome {
            donation,
            previous_status: current.status,
            credited: change.credit,
        }))
    }

    /// SUCCESS donations for a campaign, newest first. With `prayers_only`,
    /// rows without prayer text are skipped.
    pub async fn list_successful(
        &self,
        campaign_id: Uuid,
        limit: i64,
        prayers_only: bool,
    ) -> Result<Vec<Donation>, DatabaseError> {
        #[cfg(feature = "cache")]
        let cache_key = DonationListKey::new(campaign_id, prayers_only, limit).to_string();

        #[cfg(feature = "cache")]
        if let Some(ref cache) = self.cache {
            if let Ok(Some(cached)) =
                <RedisCache as Cache<Vec<Donation>>>::get(cache, &cache_key).await
            {
                debug!("Cache hit for donation listing: {}", cache_key);
                return Ok(cached);
            }
        }

        let prayer_filter = if prayers_only {
            "AND prayer IS NOT NULL AND btrim(prayer) <> ''"
        } else {
            ""
        };

        let donations = sqlx::query_as::<_, Donation>(&format!(
            "SELECT {DONATION_COLUMNS} FROM donations
             WHERE campaign_id = $1 AND status = 'SUCCESS' {prayer_filter}
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        #[cfg(feature = "cache")]
        if let Some(ref cache) = self.cache {
            let ttl = crate::cache::cache::ttl::DONATION_LISTINGS;
            if let Err(e) = cache.set(&cache_key, &donations, Some(ttl)).await {
                debug!("Failed to cache donation listing: {}", e);
            }
        }

        Ok(donations)
    }

    /// Drop cached listings for one campaign, or for all campaigns with `None`
    #[cfg(feature = "cache")]
    pub async fn invalidate_listings(&self, campaign_id: Option<Uuid>) {
        if let Some(ref cache) = self.cache {
            let pattern = match campaign_id {
                Some(id) => DonationListKey::campaign_pattern(id),
                None => DonationListKey::all_pattern(),
            };
            if let Err(e) =
                <RedisCache as Cache<Vec<Donation>>>::delete_pattern(cache, &pattern).await
            {
                warn!("Failed to invalidate donation listings '{}': {}", pattern, e);
            }
        }
    }

    #[cfg(not(feature = "cache"))]
    pub async fn invalidate_listings(&self, _campaign_id: Option<Uuid>) {}
}
