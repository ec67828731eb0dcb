//! Route handlers for the bilibili API proxy

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use std::time::Instant;

use super::error::ApiError;
use super::params::{Bvid, Cid, Required};
use super::server::ProxyState;

/// `GET /api/view?bvid=...`: video info JSON, relayed untouched
pub async fn video_info(
    State(state): State<ProxyState>,
    Required(Bvid(bvid)): Required<Bvid>,
) -> Result<Response, ApiError> {
    let start = Instant::now();

    match state.client.fetch_video_info(&bvid).await {
        Ok(body) => {
            tracing::info!(
                bvid = %bvid,
                body_size = body.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Video info fetched"
            );
            Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
        }
        Err(e) => {
            tracing::error!(bvid = %bvid, error = %e, "View API error");
            Err(ApiError::VideoInfo)
        }
    }
}

/// `GET /api/dm?cid=...`: danmaku track, decompressed and served as `text/xml`
pub async fn danmaku(
    State(state): State<ProxyState>,
    Required(Cid(cid)): Required<Cid>,
) -> Result<Response, ApiError> {
    let start = Instant::now();

    match state.client.fetch_danmaku(&cid).await {
        Ok(xml) => {
            tracing::info!(
                cid = %cid,
                body_size = xml.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Danmaku fetched"
            );
            Ok(([(header::CONTENT_TYPE, "text/xml")], xml).into_response())
        }
        Err(e) => {
            tracing::error!(cid = %cid, error = %e, "Danmaku API error");
            Err(ApiError::Danmaku)
        }
    }
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}
