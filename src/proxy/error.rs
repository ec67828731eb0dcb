//! Errors returned to API callers
//!
//! Upstream failure detail never reaches the caller. Handlers log the cause
//! and map it to one of the static messages below.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const VIDEO_INFO_FAILED: &str = "Failed to fetch video info";
pub const DANMAKU_FAILED: &str = "Failed to fetch danmaku";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing {0}")]
    MissingParam(&'static str),

    #[error("{}", VIDEO_INFO_FAILED)]
    VideoInfo,

    #[error("{}", DANMAKU_FAILED)]
    Danmaku,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParam(_) => StatusCode::BAD_REQUEST,
            ApiError::VideoInfo | ApiError::Danmaku => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            // Plain text, the danmaku route never speaks JSON on failure
            ApiError::Danmaku => (status, DANMAKU_FAILED).into_response(),
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}
