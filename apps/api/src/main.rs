mod access;
mod audit;
mod career;
mod config;
mod db;
mod documents;
mod errors;
mod extraction_client;
mod models;
mod pay_scale;
mod rate_limit;
mod routes;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::extraction_client::ExtractionClient;
use crate::rate_limit::{RateLimitConfig, RateLimiter, RedisRateLimiter, SlidingWindowLimiter};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Personnel API v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL (migrations run on connect)
    let pool = create_pool(&config.database_url).await?;
    let store = Arc::new(PgStore::new(pool));

    let limits = RateLimitConfig::new(config.rate_limit_max_requests, config.rate_limit_window_secs);
    let rate_limiter: Arc<dyn RateLimiter> = match &config.redis_url {
        Some(url) => {
            let limiter = RedisRateLimiter::connect(url, limits).await?;
            info!("Redis rate limiter initialized");
            Arc::new(limiter)
        }
        None => {
            warn!("REDIS_URL not set; rate limits are per process");
            Arc::new(SlidingWindowLimiter::new(limits))
        }
    };

    let extraction = match &config.extraction_service_url {
        Some(url) => {
            let client = ExtractionClient::new(url, config.extraction_api_key.clone())?;
            info!("Extraction client initialized ({})", client.endpoint());
            Some(client)
        }
        None => {
            info!("EXTRACTION_SERVICE_URL not set; extract endpoint disabled");
            None
        }
    };

    info!(
        policy = ?config.unresolved_pay_policy,
        "Unresolved pay policy"
    );

    let state = AppState {
        store,
        config: config.clone(),
        rate_limiter,
        extraction,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
