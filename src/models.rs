//! Shared request/response models

use serde::{Deserialize, Serialize};

/// Frame submission (`POST /analyze`)
#[derive(Debug, Clone, Deserialize)]
pub struct FrameRequest {
    /// Base64 image, optionally behind a data-URI header
    pub image: String,
    pub user_id: String,
    pub session_id: String,
}

/// Finalize request (`POST /finalize`)
#[derive(Debug, Clone, Deserialize)]
pub struct FinalizeRequest {
    pub user_id: String,
    pub session_id: String,
}

/// `/analyze` reply: the verdict, or why there is none
///
/// Failures are reported in the body with a 200 so polling clients keep going.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Verdict { attentive: bool },
    Failed { error: String },
}

/// `/finalize` reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance_percent: Option<f64>,
}

impl FinalizeResponse {
    pub fn stored(attendance_percent: f64) -> Self {
        Self {
            message: "Final attendance stored.".to_string(),
            attendance_percent: Some(attendance_percent),
        }
    }

    pub fn no_data() -> Self {
        Self {
            message: "No session data found.".to_string(),
            attendance_percent: None,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub detector_connected: bool,
    pub db_connected: bool,
    pub live_sessions: usize,
}
