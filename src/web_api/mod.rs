//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - HTTP API routes
//! - Map requests onto aggregator operations
//! - Response formatting

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (detector_ok, db_ok) = tokio::join!(state.detector.health_check(), state.sink.health_check());

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        detector_connected: detector_ok,
        db_connected: db_ok,
        live_sessions: state.aggregator.live_count().await,
    };

    Json(response)
}
