pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::rate_limit::rate_limit;
use crate::state::AppState;
use crate::{audit, career, documents, pay_scale};

pub fn build_router(state: AppState) -> Router {
    // Every mutating route sits behind the rate limiter.
    let writes = Router::new()
        .route("/api/v1/pay-scales", post(pay_scale::handlers::handle_import))
        .route(
            "/api/v1/workers/:id/career-actions",
            post(career::handlers::handle_record_action),
        )
        .route(
            "/api/v1/documents/:id/confirm",
            post(documents::handlers::handle_confirm),
        )
        .route(
            "/api/v1/documents/:id/extract",
            post(documents::handlers::handle_extract),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/pay-scales/resolve",
            get(pay_scale::handlers::handle_resolve),
        )
        .route(
            "/api/v1/workers/:id/audit-flag",
            get(audit::handlers::handle_get_flag),
        )
        .merge(writes)
        .with_state(state)
}
