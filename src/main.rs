use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crowdfund_backend::api::{self, AppState, StateSettings};
use crowdfund_backend::config::Config;
use crowdfund_backend::database::{self, PoolConfig};
use crowdfund_backend::ledger::donations::DonationSettings;
use crowdfund_backend::ledger::notify::TracingNotifier;
use crowdfund_backend::payments::MidtransGateway;
use crowdfund_backend::store::PgStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(feature = "cache")]
async fn build_store(config: &Config, pool: sqlx::PgPool) -> PgStore {
    use crowdfund_backend::cache::{init_cache_pool, CacheConfig, RedisCache};

    let Some(redis) = &config.redis else {
        tracing::info!("REDIS_URL not set, listing cache disabled");
        return PgStore::new(pool);
    };

    match init_cache_pool(CacheConfig::with_url(redis.url.clone())).await {
        Ok(redis_pool) => PgStore::with_cache(pool, RedisCache::new(redis_pool)),
        Err(e) => {
            tracing::warn!("Redis unavailable, serving listings from Postgres: {}", e);
            PgStore::new(pool)
        }
    }
}

#[cfg(not(feature = "cache"))]
async fn build_store(_config: &Config, pool: sqlx::PgPool) -> PgStore {
    PgStore::new(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting crowdfund backend");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Midtrans API: {}", config.midtrans.api_url);

    let pool = database::init_pool(
        &config.database.url,
        Some(PoolConfig::from(&config.database)),
    )
    .await
    .context("Failed to connect to Postgres")?;
    database::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let store = Arc::new(build_store(&config, pool).await);
    let gateway = Arc::new(
        MidtransGateway::new(config.midtrans.clone()).context("Failed to build Midtrans client")?,
    );

    let state = AppState::new(
        store,
        gateway,
        Arc::new(TracingNotifier),
        StateSettings {
            donations: DonationSettings {
                min_amount: config.donations.min_amount,
                finish_url: Some(config.finish_url()),
            },
            jwt_secret: config.auth.jwt_secret.clone(),
            frontend_url: config.frontend_url.clone(),
            environment: config.server.environment.clone(),
        },
    );

    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("HOST and PORT must form a valid socket address")?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
