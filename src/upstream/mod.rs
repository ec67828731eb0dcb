//! Outbound client for the bilibili web API

mod decode;

use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;
use url::Url;

use crate::config::{BrowserHeadersConfig, UpstreamConfig};

pub use decode::decompress_body;

/// Encodings we are able to undo, see [`decompress_body`]
const ACCEPT_ENCODING: &str = "gzip, deflate, br, zstd";

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to read body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("upstream body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("invalid {0} header value")]
    Header(header::HeaderName),

    #[error("invalid upstream URL {url}: {reason}")]
    Url { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Build the fixed browser header set attached to every upstream request
pub fn browser_headers(config: &BrowserHeadersConfig) -> Result<HeaderMap, UpstreamError> {
    let mut headers = HeaderMap::new();
    for (name, value) in [
        (header::USER_AGENT, &config.user_agent),
        (header::REFERER, &config.referer),
        (header::ORIGIN, &config.origin),
    ] {
        let value = HeaderValue::from_str(value).map_err(|_| UpstreamError::Header(name.clone()))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn parse_url(raw: &str) -> Result<Url, UpstreamError> {
    let url = Url::parse(raw).map_err(|e| UpstreamError::Url {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(UpstreamError::Url {
            url: raw.to_string(),
            reason: "cannot be a base URL".to_string(),
        });
    }
    Ok(url)
}

/// Client for the two bilibili endpoints we proxy
///
/// Built once at start-up. Cloning is cheap: `reqwest::Client` is reference
/// counted and the URLs are never mutated after construction.
#[derive(Debug, Clone)]
pub struct BiliClient {
    http: reqwest::Client,
    view_url: Url,
    comment_base: Url,
}

impl BiliClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .default_headers(browser_headers(&config.headers)?)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            http,
            view_url: parse_url(&config.view_url)?,
            comment_base: parse_url(config.comment_base())?,
        })
    }

    /// Fetch video info JSON for a `bvid`, returned byte for byte
    pub async fn fetch_video_info(&self, bvid: &str) -> Result<Bytes, UpstreamError> {
        let mut url = self.view_url.clone();
        url.query_pairs_mut().append_pair("bvid", bvid);

        tracing::debug!(url = %url, "Fetching video info");

        let response = self.http.get(url).send().await.map_err(UpstreamError::Request)?;
        let body = read_body(response).await?;

        // Relay verbatim, but only if it really is JSON
        serde_json::from_slice::<serde::de::IgnoredAny>(&body).map_err(UpstreamError::InvalidJson)?;

        Ok(body)
    }

    /// Fetch the danmaku XML track for a `cid` as text
    pub async fn fetch_danmaku(&self, cid: &str) -> Result<String, UpstreamError> {
        let url = self.danmaku_url(cid);

        tracing::debug!(url = %url, "Fetching danmaku");

        let response = self
            .http
            .get(url)
            .header(header::ACCEPT_ENCODING, ACCEPT_ENCODING)
            .send()
            .await
            .map_err(UpstreamError::Request)?;
        let body = read_body(response).await?;

        match String::from_utf8(body.to_vec()) {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(
                    cid = cid,
                    valid_up_to = e.utf8_error().valid_up_to(),
                    "Danmaku body is not valid UTF-8, replacing invalid sequences"
                );
                Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        }
    }

    /// `<comment_base>/<cid>.xml`, with `cid` percent-encoded as a single path segment
    pub fn danmaku_url(&self, cid: &str) -> Url {
        let mut url = self.comment_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&format!("{}.xml", cid));
        }
        url
    }
}

/// Check the status, read the raw bytes and undo any remaining transport encoding
async fn read_body(response: reqwest::Response) -> Result<Bytes, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        return Err(UpstreamError::Status(status));
    }

    let content_encoding = response
        .headers()
        .get(header::CONTENT_ENCODING)
        .and_then(|ce| ce.to_str().ok())
        .map(str::to_string);

    let raw = response.bytes().await.map_err(UpstreamError::Body)?;
    if content_encoding.is_none() {
        return Ok(raw);
    }

    decompress_body(&raw, content_encoding.as_deref()).map(Bytes::from)
}
