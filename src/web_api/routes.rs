//! API Routes

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::frame_decoder;
use crate::models::{AnalyzeResponse, FinalizeRequest, FinalizeResponse, FrameRequest};
use crate::session_aggregator::{AttendanceKey, AttendanceStats};
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Frame intake
        .route("/analyze", post(analyze_frame))
        // Attendance queries
        .route("/attendance/session/:session_id", get(session_attendance))
        .route("/attendance/:user_id/:session_id", get(user_attendance))
        // Finalize
        .route("/finalize", post(finalize_session))
        .with_state(state)
}

// ========================================
// Frame Intake
// ========================================

async fn analyze_frame(
    State(state): State<AppState>,
    payload: std::result::Result<Json<FrameRequest>, JsonRejection>,
) -> Response {
    // Malformed body is a request error, not a frame verdict
    let frame = match payload {
        Ok(Json(frame)) => frame,
        Err(rejection) => return Error::from(rejection).into_response(),
    };

    tracing::info!(
        user_id = %frame.user_id,
        session_id = %frame.session_id,
        "Frame received"
    );

    let key = AttendanceKey::new(frame.user_id, frame.session_id);

    match evaluate_frame(&state, frame.image).await {
        Ok(attentive) => {
            let stats = state.aggregator.record(&key, attentive).await;
            tracing::debug!(
                key = %key,
                attentive = attentive,
                total_frames = stats.total_frames,
                attentive_frames = stats.attentive_frames,
                "Frame recorded"
            );
            Json(AnalyzeResponse::Verdict { attentive }).into_response()
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Frame rejected");
            Json(AnalyzeResponse::Failed {
                error: e.to_string(),
            })
            .into_response()
        }
    }
}

/// Decode, detect, and reduce to a verdict. Touches no aggregator state.
async fn evaluate_frame(state: &AppState, image: String) -> Result<bool> {
    let frame = tokio::task::spawn_blocking(move || frame_decoder::decode_frame(&image))
        .await
        .map_err(|e| Error::Internal(format!("frame decode task failed: {}", e)))??;

    let detections = match timeout(state.config.detector_timeout, state.detector.detect(&frame)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(Error::Timeout(format!(
                "detector did not respond within {}ms",
                state.config.detector_timeout.as_millis()
            )))
        }
    };

    Ok(state.config.person_filter().is_attentive(&detections))
}

// ========================================
// Attendance Queries
// ========================================

async fn user_attendance(
    State(state): State<AppState>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Json<AttendanceStats> {
    tracing::info!(user_id = %user_id, session_id = %session_id, "Attendance requested");

    let key = AttendanceKey::new(user_id, session_id);
    Json(state.aggregator.read(&key).await)
}

/// Query parameters for the host-only session query
#[derive(Debug, Deserialize)]
struct HostTokenQuery {
    token: Option<String>,
}

async fn session_attendance(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<HostTokenQuery>,
) -> Result<Json<Vec<AttendanceStats>>> {
    if !state.config.token_matches(query.token.as_deref()) {
        return Err(Error::Unauthorized("Host token invalid".to_string()));
    }

    tracing::info!(session_id = %session_id, "Host requested session attendance");

    Ok(Json(state.aggregator.read_all_for_session(&session_id).await))
}

// ========================================
// Finalize
// ========================================

async fn finalize_session(
    State(state): State<AppState>,
    payload: std::result::Result<Json<FinalizeRequest>, JsonRejection>,
) -> Result<Json<FinalizeResponse>> {
    let Json(req) = payload?;
    let key = AttendanceKey::new(req.user_id, req.session_id);

    match state.aggregator.finalize(&key).await? {
        Some(stats) => Ok(Json(FinalizeResponse::stored(stats.attendance_percent))),
        None => {
            tracing::info!(key = %key, "Finalize requested with no session data");
            Ok(Json(FinalizeResponse::no_data()))
        }
    }
}
