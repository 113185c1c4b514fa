//! Pull endpoints for scrapes and dashboards (requires the `http` feature).

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};

use crate::metrics::EXPOSITION_CONTENT_TYPE;
use crate::Observability;

/// Shared state for the pull endpoints.
#[derive(Clone)]
pub struct ApiState {
    pub core: Arc<Observability>,
}

impl ApiState {
    pub fn new(core: Arc<Observability>) -> Self {
        Self { core }
    }
}

/// Handler for `GET /metrics`.
pub async fn metrics_handler(State(state): State<ApiState>) -> Response {
    let body = state.core.render_exposition();
    (
        StatusCode::OK,
        [("content-type", EXPOSITION_CONTENT_TYPE)],
        body,
    )
        .into_response()
}

/// Handler for `GET /health`.
pub async fn health_handler(State(state): State<ApiState>) -> Response {
    let overall = state.core.health().overall_health();
    let body = serde_json::json!({
        "status": overall,
        "checks": state.core.health().latest_results(),
    });

    let status = if overall == crate::HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(body)).into_response()
}

/// Handler for `GET /dashboard`.
pub async fn dashboard_handler(State(state): State<ApiState>) -> Response {
    Json(state.core.dashboard_snapshot()).into_response()
}

/// Build the router exposing the core.
pub fn router(core: Arc<Observability>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/dashboard", get(dashboard_handler))
        .with_state(ApiState::new(core))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObservabilityConfig;

    #[tokio::test]
    async fn router_builds_with_core_state() {
        let core = Arc::new(Observability::new(ObservabilityConfig::default()));
        core.sampler().set_enabled(false);
        let _router = router(core);
    }
}
