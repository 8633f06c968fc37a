use std::sync::Arc;

use crate::config::Config;
use crate::extraction_client::ExtractionClient;
use crate::rate_limit::RateLimiter;
use crate::store::EngineStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pay scales, ledgers, documents, flags. Postgres in production.
    pub store: Arc<dyn EngineStore>,
    pub config: Config,
    /// Guards the write routes. Redis-backed when `REDIS_URL` is set.
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub extraction: Option<ExtractionClient>,
}
