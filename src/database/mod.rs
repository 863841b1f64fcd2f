pub mod campaign_repository;
pub mod campaign_update_repository;
pub mod donation_repository;
pub mod error;
pub mod report_repository;
pub mod transaction;
pub mod user_repository;
pub mod webhook_repository;
pub mod withdrawal_repository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error as log_error, info, warn};

use self::error::DatabaseError;
use crate::config::DatabaseConfig;

/// Status columns are stored as `TEXT` with a CHECK constraint; this maps a
/// closed Rust enum onto those strings in both directions.
macro_rules! text_enum {
    ($name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::database::UnknownStatus;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err($crate::database::UnknownStatus {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::database::UnknownStatus;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

pub(crate) use text_enum;

/// A status column held a value outside its enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} status '{value}'")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 2,
            connection_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl From<&DatabaseConfig> for PoolConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            min_connections: config.min_connections.min(config.max_connections),
            connection_timeout: Duration::from_secs(config.acquire_timeout_secs),
            ..Self::default()
        }
    }
}

/// Initialize the database connection pool
pub async fn init_pool(
    database_url: &str,
    config: Option<PoolConfig>,
) -> Result<PgPool, DatabaseError> {
    let config = config.unwrap_or_default();

    info!(
        "Initializing database pool: max_connections={}, min_connections={}, connection_timeout={:?}",
        config.max_connections, config.min_connections, config.connection_timeout
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(database_url)
        .await
        .map_err(|e| {
            log_error!("Failed to initialize database pool: {}", e);
            DatabaseError::from_sqlx(e)
        })?;

    info!("Database pool initialized successfully");
    Ok(pool)
}

/// Apply pending schema migrations from `migrations/`
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        log_error!("Failed to run migrations: {}", e);
        DatabaseError::from(e)
    })?;

    info!("Database migrations applied");
    Ok(())
}

/// Connection pool health check
pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::query("SELECT 1").execute(pool).await.map_err(|e| {
        warn!("Health check failed: {}", e);
        DatabaseError::from_sqlx(e)
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.connection_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_pool_config_from_database_config_clamps_min() {
        let db = DatabaseConfig {
            url: "postgres://localhost/crowdfund".to_string(),
            max_connections: 3,
            min_connections: 10,
            acquire_timeout_secs: 5,
        };

        let config = PoolConfig::from(&db);
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.min_connections, 3);
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
    }
}
