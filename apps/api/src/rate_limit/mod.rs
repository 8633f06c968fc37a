//! Sliding-window rate limiting for the mutating routes.
//!
//! Two limiters share one trait:
//! - `SlidingWindowLimiter` keeps per-client timestamps in process memory.
//! - `RedisRateLimiter` keeps them in a sorted set per client so every API
//!   instance sees the same window.
//!
//! Clients are keyed by the first `x-forwarded-for` hop, falling back to the
//! socket address.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use redis::aio::MultiplexedConnection;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";
const KEY_PREFIX: &str = "personnel:rl:";
/// Sweep idle clients out of the in-process map every this many checks.
const CLEANUP_INTERVAL: u64 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, client: &str) -> Result<RateDecision, AppError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window: Duration::from_secs(window_secs.max(1)),
        }
    }
}

struct WindowState {
    clients: HashMap<String, VecDeque<Instant>>,
    checks: u64,
}

pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    state: Mutex<WindowState>,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(WindowState {
                clients: HashMap::new(),
                checks: 0,
            }),
        }
    }

    fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let window = self.config.window;
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        state.checks += 1;
        if state.checks % CLEANUP_INTERVAL == 0 {
            state
                .clients
                .retain(|_, hits| hits.back().is_some_and(|t| now.duration_since(*t) < window));
        }

        let hits = state.clients.entry(client.to_string()).or_default();
        while hits.front().is_some_and(|t| now.duration_since(*t) >= window) {
            hits.pop_front();
        }

        if hits.len() >= self.config.max_requests as usize {
            let retry_after = hits
                .front()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            return RateDecision::Limited {
                retry_after_secs: retry_after.as_secs().max(1),
            };
        }

        hits.push_back(now);
        RateDecision::Allowed {
            remaining: self.config.max_requests - hits.len() as u32,
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn check(&self, client: &str) -> Result<RateDecision, AppError> {
        Ok(self.check_at(client, Instant::now()))
    }
}

pub struct RedisRateLimiter {
    config: RateLimitConfig,
    conn: MultiplexedConnection,
}

impl RedisRateLimiter {
    pub async fn connect(redis_url: &str, config: RateLimitConfig) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { config, conn })
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, client: &str) -> Result<RateDecision, AppError> {
        let key = format!("{KEY_PREFIX}{client}");
        let window_ms = self.config.window.as_millis() as i64;
        let now_ms = chrono::Utc::now().timestamp_millis();
        let member = format!("{now_ms}-{}", Uuid::new_v4().simple());

        let mut conn = self.conn.clone();
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(&key)
            .arg(0)
            .arg(now_ms - window_ms)
            .ignore()
            .cmd("ZADD")
            .arg(&key)
            .arg(now_ms)
            .arg(&member)
            .ignore()
            .cmd("ZCARD")
            .arg(&key)
            .cmd("PEXPIRE")
            .arg(&key)
            .arg(window_ms)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("rate limiter: {e}")))?;

        let max = u64::from(self.config.max_requests);
        if count > max {
            // Rejected hits do not count against the window.
            let removed: redis::RedisResult<()> = redis::cmd("ZREM")
                .arg(&key)
                .arg(&member)
                .query_async(&mut conn)
                .await;
            release_rejected_hit(client, removed);
            return Ok(RateDecision::Limited {
                retry_after_secs: self.config.window.as_secs(),
            });
        }
        Ok(RateDecision::Allowed {
            remaining: (max - count) as u32,
        })
    }
}

/// Reports whether a rejected hit was taken back out of the window.
fn release_rejected_hit(client: &str, removed: redis::RedisResult<()>) -> bool {
    match removed {
        Ok(()) => true,
        Err(e) => {
            warn!(%client, "rejected hit left in rate window: {e}");
            false
        }
    }
}

/// Client key: first `x-forwarded-for` hop, else the peer address.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware for the write routes.
pub async fn rate_limit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_key(request.headers(), connect_info.map(|ConnectInfo(addr)| addr));
    match state.rate_limiter.check(&client).await? {
        RateDecision::Allowed { remaining } => {
            debug!(%client, remaining, "rate limit check passed");
            Ok(next.run(request).await)
        }
        RateDecision::Limited { retry_after_secs } => {
            warn!(%client, retry_after_secs, "rate limit exceeded");
            Err(AppError::TooManyRequests { retry_after_secs })
        }
    }
}
