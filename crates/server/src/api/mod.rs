pub mod audit;
pub mod health;
pub mod schemas;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the Axum router: health/metrics are always public, the audit
/// surface requires the `X-Tenant-Id` header (enforced per-handler by the
/// [`crate::tenant::TenantId`] extractor).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .route("/audit", get(audit::list))
        .route("/audit/integrity", get(audit::integrity))
        .route("/audit/verify", get(audit::verify))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
