use crate::database::error::DatabaseError;
use serde::Serialize;
use sqlx::postgres::PgConnection;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// The slice of a platform user the ledger touches. Account management
/// lives outside this service.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub warning_count: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a user row (used by seeding and integration tests)
    pub async fn create(&self, name: &str, email: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, email) VALUES ($1, $2, $3)
             RETURNING id, name, email, warning_count, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, warning_count, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Bump a creator's warning counter, returning the new count
    pub async fn increment_warnings(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<i32, DatabaseError> {
        sqlx::query_scalar::<_, i32>(
            "UPDATE users SET warning_count = warning_count + 1 WHERE id = $1
             RETURNING warning_count",
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("User", user_id))
    }
}
