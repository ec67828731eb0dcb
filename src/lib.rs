//! bili-proxy: HTTP reverse proxy for the bilibili web API
//!
//! Features:
//! - `/api/view`: video info JSON, relayed verbatim
//! - `/api/dm`: danmaku XML, decompressed and decoded as UTF-8
//! - Browser headers (User-Agent, Referer, Origin) on every upstream call
//! - Permissive CORS and a static front-end directory

pub mod config;
pub mod proxy;
pub mod upstream;

pub use config::AppConfig;
pub use proxy::{build_router, run_server, ProxyState};
pub use upstream::BiliClient;
