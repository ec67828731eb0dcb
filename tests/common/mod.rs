//! Mock bilibili upstream for integration tests
//!
//! Serves the two endpoints the proxy calls and records every request it
//! receives, so tests can assert on headers and on whether a call happened.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bili_proxy::{build_router, config::AppConfig, ProxyState};
use flate2::{write::DeflateEncoder, write::GzEncoder, Compression};
use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const VIEW_PATH: &str = "/x/web-interface/view";
pub const COMMENT_PATH: &str = "/comment";

/// What the mock saw for one request
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
}

pub type Received = Arc<Mutex<Vec<ReceivedRequest>>>;

pub struct MockUpstream {
    pub addr: SocketAddr,
    pub received: Received,
}

impl MockUpstream {
    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.received.lock().unwrap().clone()
    }

    /// Proxy config pointed at this mock
    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.upstream.view_url = format!("http://{}{}", self.addr, VIEW_PATH);
        config.upstream.comment_base_url = format!("http://{}{}", self.addr, COMMENT_PATH);
        config.upstream.timeout_seconds = 1;
        config.upstream.connect_timeout_seconds = 1;
        config
    }
}

/// The video info body the mock returns, deliberately not in serde_json's canonical layout
pub fn view_body(bvid: &str) -> String {
    format!(
        "{{\"code\":0,  \"message\":\"0\",\n \"data\":{{\"bvid\":\"{}\",\"cid\":{},\"title\":\"测试视频\"}}}}",
        bvid,
        cid_for(bvid)
    )
}

/// Deterministic cid for a bvid, so tests can chain view -> dm
pub fn cid_for(bvid: &str) -> u64 {
    bvid.bytes().fold(100_000u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64) % 1_000_000_007)
}

pub fn danmaku_xml(cid: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><i><chatid>{}</chatid><d p="1.5,1,25,16777215">test弹幕</d></i>"#,
        cid
    )
}

/// Track whose comment text is ISO-8859-1 `café`, i.e. contains a lone 0xE9
pub fn latin1_xml(cid: &str) -> Vec<u8> {
    let mut body = format!(r#"<?xml version="1.0" encoding="UTF-8"?><i><chatid>{}</chatid><d p="1,1,25,0">caf"#, cid)
        .into_bytes();
    body.push(0xE9);
    body.extend_from_slice(b"</d></i>");
    body
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn raw_deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn record(received: &Received, path: String, query: HashMap<String, String>, headers: HeaderMap) {
    received.lock().unwrap().push(ReceivedRequest { path, query, headers });
}

/// `bvid` values with special behaviour:
/// - `BVfail`: 500
/// - `BVhtml`: 200 with an HTML body
/// - `BVslow`: answers after 3s
async fn handle_view(
    State(received): State<Received>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record(&received, VIEW_PATH.to_string(), query.clone(), headers);

    let bvid = query.get("bvid").cloned().unwrap_or_default();
    match bvid.as_str() {
        "BVfail" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        "BVhtml" => (
            [(header::CONTENT_TYPE, "text/html")],
            "<html><body>blocked</body></html>",
        )
            .into_response(),
        "BVslow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            ([(header::CONTENT_TYPE, "application/json")], view_body(&bvid)).into_response()
        }
        _ => ([(header::CONTENT_TYPE, "application/json")], view_body(&bvid)).into_response(),
    }
}

/// `<cid>.xml` values with special behaviour:
/// - `404`: not found
/// - `deflate-<n>`: raw deflate with `Content-Encoding: deflate`
/// - `plain-<n>`: uncompressed
/// - `stacked-<n>`: raw deflate then zstd, `Content-Encoding: deflate, zstd`
/// - `compress-<n>`: gzip bytes labelled with the unsupported `compress`
/// - `latin1-<n>`: uncompressed, with a byte that is not valid UTF-8
/// - anything else: gzip with `Content-Encoding: gzip`
///
/// Every track is served as `text/plain` so the proxy has to override it.
async fn handle_comment(
    State(received): State<Received>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Response {
    record(&received, format!("{}/{}", COMMENT_PATH, file), HashMap::new(), headers);

    let Some(cid) = file.strip_suffix(".xml") else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let xml = danmaku_xml(cid);

    let (encoding, body) = if cid == "404" {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    } else if cid.starts_with("deflate-") {
        (Some("deflate"), raw_deflate(xml.as_bytes()))
    } else if cid.starts_with("plain-") {
        (None, xml.into_bytes())
    } else if cid.starts_with("stacked-") {
        let deflated = raw_deflate(xml.as_bytes());
        (Some("deflate, zstd"), zstd::encode_all(deflated.as_slice(), 3).unwrap())
    } else if cid.starts_with("compress-") {
        (Some("compress"), gzip(xml.as_bytes()))
    } else if cid.starts_with("latin1-") {
        (None, latin1_xml(cid))
    } else {
        (Some("gzip"), gzip(xml.as_bytes()))
    };

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain");
    if let Some(encoding) = encoding {
        response = response.header(header::CONTENT_ENCODING, encoding);
    }
    response.body(Body::from(body)).unwrap()
}

/// Start the mock upstream on an ephemeral port
pub async fn start_upstream() -> MockUpstream {
    let received: Received = Arc::new(Mutex::new(Vec::new()));

    let app = Router::new()
        .route(VIEW_PATH, get(handle_view))
        .route(&format!("{}/:file", COMMENT_PATH), get(handle_comment))
        .with_state(received.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock upstream failed");
    });

    MockUpstream { addr, received }
}

/// Proxy router wired to `upstream`, serving statics from `static_dir`
pub fn proxy_router(upstream: &MockUpstream, static_dir: &std::path::Path) -> Router {
    let mut config = upstream.config();
    config.server.static_dir = static_dir.display().to_string();
    let state = ProxyState::new(&config).unwrap();
    build_router(state, &config.server.static_dir)
}

/// Serve the proxy on a real socket and return its address
pub async fn spawn_proxy(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Proxy server failed");
    });
    addr
}

/// An address nothing listens on
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
