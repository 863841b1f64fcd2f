use anyhow::{anyhow, Context, Result};
use std::env;

use crate::payments::MidtransConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Listing cache; absent when `REDIS_URL` is unset
    pub redis: Option<RedisConfig>,
    pub midtrans: MidtransConfig,
    pub donations: DonationConfig,
    pub auth: AuthConfig,
    pub frontend_url: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct DonationConfig {
    /// Smallest accepted pledge, in rupiah
    pub min_amount: i64,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

fn parse_or<T>(name: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{} must be a valid number", name))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .context("PORT not set")?
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", "20")?,
            min_connections: parse_or("DATABASE_MIN_CONNECTIONS", "2")?,
            acquire_timeout_secs: parse_or("DATABASE_ACQUIRE_TIMEOUT_SECS", "10")?,
        };

        let redis = env::var("REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(|url| RedisConfig { url });

        let midtrans = MidtransConfig::from_env().context("Invalid Midtrans configuration")?;

        let donations = DonationConfig {
            min_amount: parse_or("DONATION_MIN_AMOUNT", "10000")?,
        };

        let auth = AuthConfig {
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET not set")?,
        };

        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .trim_end_matches('/')
            .to_string();

        let config = Config {
            server,
            database,
            redis,
            midtrans,
            donations,
            auth,
            frontend_url,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(anyhow!("DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
        }

        if let Some(redis) = &self.redis {
            if redis.url.trim().is_empty() {
                return Err(anyhow!("REDIS_URL cannot be empty"));
            }
        }

        if self.midtrans.server_key.trim().is_empty() {
            return Err(anyhow!("MIDTRANS_SERVER_KEY cannot be empty"));
        }

        if self.midtrans.snap_url.trim().is_empty() || self.midtrans.api_url.trim().is_empty() {
            return Err(anyhow!("MIDTRANS_SNAP_URL and MIDTRANS_API_URL cannot be empty"));
        }

        if self.donations.min_amount <= 0 {
            return Err(anyhow!(
                "DONATION_MIN_AMOUNT must be greater than 0, got {}",
                self.donations.min_amount
            ));
        }

        if self.auth.jwt_secret.trim().is_empty() {
            return Err(anyhow!("JWT_SECRET cannot be empty"));
        }

        if self.frontend_url.trim().is_empty() {
            return Err(anyhow!("FRONTEND_URL cannot be empty"));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.environment == "production"
    }

    /// Landing page handed to the gateway for the post-checkout redirect
    pub fn finish_url(&self) -> String {
        format!("{}/donation/success", self.frontend_url)
    }
}
