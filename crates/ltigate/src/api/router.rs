//! Axum router configuration.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use ltigate_core::{GradePassbackClient, LaunchOrchestrator, LoginInitiator, LtiConfig};
use ltigate_telemetry::MetricsRegistry;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{execute, grade, health, jwks, launch, legacy, login, metrics};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LtiConfig>,
    pub orchestrator: Arc<LaunchOrchestrator>,
    pub login: Arc<LoginInitiator>,
    /// Synchronous grade submissions from `/lti/grade`.
    pub passback: Arc<GradePassbackClient>,
    pub metrics: Arc<MetricsRegistry>,
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::prometheus_metrics))
        // LTI 1.1
        .route("/lti", post(legacy::launch))
        // LTI 1.3
        .route("/lti/login", get(login::initiate).post(login::initiate))
        .route("/lti/launch", post(launch::launch))
        .route("/lti/jwks", get(jwks::tool_key_set))
        // Grading
        .route("/lti/grade", post(grade::submit_grade))
        .route("/lti/execute", post(execute::execute_code))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
