use crate::database::error::DatabaseError;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Raw audit record of an inbound gateway notification
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub event_type: String,
    pub source: String,
    pub order_id: Option<String>,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
}

const WEBHOOK_COLUMNS: &str = "id, event_type, source, order_id, payload, processed, attempts, \
     last_error, created_at, processed_at";

/// Webhook Repository: audit trail of gateway deliveries
pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a delivery before anything else touches it
    pub async fn log_event(
        &self,
        event_type: &str,
        source: &str,
        order_id: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<WebhookEvent, DatabaseError> {
        sqlx::query_as::<_, WebhookEvent>(&format!(
            "INSERT INTO webhook_events (id, event_type, source, order_id, payload)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {WEBHOOK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(event_type)
        .bind(source)
        .bind(order_id)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn mark_processed(&self, event_id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE webhook_events SET processed = true, attempts = attempts + 1, processed_at = NOW()
             WHERE id = $1",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    pub async fn record_failure(&self, event_id: Uuid, error: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE webhook_events SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
        )
        .bind(event_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    /// Deliveries recorded for one order, oldest first
    pub async fn find_by_order_id(&self, order_id: &str) -> Result<Vec<WebhookEvent>, DatabaseError> {
        sqlx::query_as::<_, WebhookEvent>(&format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhook_events WHERE order_id = $1
             ORDER BY created_at ASC"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
